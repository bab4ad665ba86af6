//! Setting service: cache-aside reads and invalidating writes
//!
//! Reads consult the cache first and fall back to storage on a miss, then
//! populate the cache. Writes go to storage and then delete the cache entry,
//! so the next read repopulates it lazily. If that delete keeps failing the
//! write reports the cache error even though storage already holds the new
//! value; the caller can retry the write or call `clear_cache`.
//!
//! There is no coordination between concurrent callers. Two misses on the same
//! key both read storage and both populate the cache. A `get` racing a `set`
//! may cache the older value; the staleness is bounded by the TTL.
//!
//! Cache failures never fail a read. Storage failures always propagate.

use crate::cache::{CacheGateway, CacheKey, CacheStores};
use crate::gateway::StorageGateway;
use setwise_core::{
    CacheSettings, PayloadCodec, Record, SettingType, SettingValue, SettingsConfig,
    SettingsError, SettingsResult, DEFAULT_GROUP,
};
use std::fmt;
use std::sync::Arc;

/// Attempts at evicting a cache entry after a write.
const INVALIDATE_ATTEMPTS: usize = 2;

/// Entry point for reading and writing settings.
///
/// Cheap to clone; clones share the same gateways.
#[derive(Clone)]
pub struct SettingService {
    storage: Arc<dyn StorageGateway>,
    cache: Option<Arc<dyn CacheGateway>>,
    codec: PayloadCodec,
    settings: CacheSettings,
}

impl SettingService {
    /// Assemble a service from explicit parts.
    ///
    /// `cache` is ignored when `settings.enabled` is false.
    pub fn new(
        storage: Arc<dyn StorageGateway>,
        cache: Option<Arc<dyn CacheGateway>>,
        codec: PayloadCodec,
        settings: CacheSettings,
    ) -> Self {
        Self {
            storage,
            cache,
            codec,
            settings,
        }
    }

    /// Validate `config` and resolve its cache store from `stores`.
    ///
    /// The store is only looked up when caching is enabled.
    pub fn from_config(
        config: &SettingsConfig,
        storage: Arc<dyn StorageGateway>,
        stores: &CacheStores,
        codec: PayloadCodec,
    ) -> SettingsResult<Self> {
        config.validate()?;

        let cache = if config.cache.enabled {
            Some(stores.resolve(&config.cache.store)?)
        } else {
            None
        };

        tracing::debug!(
            table = %config.table_name,
            cache_enabled = config.cache.enabled,
            store = %config.cache.store,
            "Setting service configured"
        );

        Ok(Self::new(storage, cache, codec, config.cache.clone()))
    }

    /// Cache settings this service was built with.
    pub fn cache_settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Derived cache key for `key`.
    pub fn cache_key(&self, key: &str) -> CacheKey {
        CacheKey::new(&self.settings.prefix, key)
    }

    fn active_cache(&self) -> Option<&Arc<dyn CacheGateway>> {
        if self.settings.enabled {
            self.cache.as_ref()
        } else {
            None
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Value of `key`, or `default` when no record exists.
    pub async fn get(
        &self,
        key: &str,
        default: impl Into<SettingValue>,
    ) -> SettingsResult<SettingValue> {
        let default = default.into();
        Ok(self.find(key).await?.unwrap_or(default))
    }

    /// Value of `key`, `None` when no record exists.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn find(&self, key: &str) -> SettingsResult<Option<SettingValue>> {
        let Some(cache) = self.active_cache() else {
            return self.load(key).await;
        };

        let cache_key = self.cache_key(key);
        let cache_healthy = match cache.get(&cache_key).await {
            Ok(Some(value)) => {
                tracing::debug!(cache_key = %cache_key, "Setting cache hit");
                return Ok(Some(value));
            }
            Ok(None) => {
                tracing::debug!(cache_key = %cache_key, "Setting cache miss");
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    cache_key = %cache_key,
                    "Cache read failed, reading from storage"
                );
                false
            }
        };

        let value = self.load(key).await?;

        // Absent keys are not cached.
        if let (true, Some(value)) = (cache_healthy, value.as_ref()) {
            if let Err(e) = cache.set(&cache_key, value, self.settings.ttl).await {
                tracing::warn!(
                    error = %e,
                    cache_key = %cache_key,
                    "Failed to populate setting cache"
                );
            }
        }

        Ok(value)
    }

    async fn load(&self, key: &str) -> SettingsResult<Option<SettingValue>> {
        let record = self.storage.find_by_key(key).await?;
        Ok(record.map(|r| self.codec.decode_record(&r)))
    }

    /// Whether a record exists for `key`. Always reads storage.
    pub async fn has(&self, key: &str) -> SettingsResult<bool> {
        self.storage.exists(key).await
    }

    /// Full record for `key`. Always reads storage.
    pub async fn record(&self, key: &str) -> SettingsResult<Option<Record>> {
        self.storage.find_by_key(key).await
    }

    /// Decoded `(key, value)` pairs of one group, ordered by key. Always
    /// reads storage.
    pub async fn group(&self, group: &str) -> SettingsResult<Vec<(String, SettingValue)>> {
        let records = self.storage.list_group(group).await?;
        Ok(records
            .into_iter()
            .map(|r| {
                let value = self.codec.decode_record(&r);
                (r.key, value)
            })
            .collect())
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Store `value` under `key` as `setting_type`.
    ///
    /// `group` only applies when the key is new. Fails with
    /// [`SettingsError::Locked`] when the existing record is locked, and
    /// with a cipher error when an `encrypted` value cannot be encrypted.
    /// Nothing is written in either case. A cache error means the value was
    /// stored but the old cache entry could not be evicted.
    #[tracing::instrument(skip(self, value))]
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<SettingValue> + Send,
        setting_type: SettingType,
        group: &str,
    ) -> SettingsResult<Record> {
        let value = value.into();

        let mut record = match self.storage.find_by_key(key).await? {
            Some(existing) if existing.is_locked => return Err(refuse_locked(key)),
            Some(existing) => existing,
            None => Record::new(group, key),
        };

        let payload = self.codec.encode(&value, setting_type)?;
        record.apply_payload(payload, setting_type);

        let saved = self.storage.upsert(&record).await?;
        self.invalidate(key).await?;
        Ok(saved)
    }

    /// [`SettingService::set`] with type `string` in the `general` group.
    pub async fn set_default_type(
        &self,
        key: &str,
        value: impl Into<SettingValue> + Send,
    ) -> SettingsResult<Record> {
        self.set(key, value, SettingType::String, DEFAULT_GROUP).await
    }

    /// Delete `key`, returning whether a record was removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> SettingsResult<bool> {
        if let Some(existing) = self.storage.find_by_key(key).await? {
            if existing.is_locked {
                return Err(refuse_locked(key));
            }
        }

        let removed = self.storage.delete_by_key(key).await? > 0;
        if removed {
            self.invalidate(key).await?;
        }
        Ok(removed)
    }

    /// Set or clear the lock flag. This is the one write a locked record
    /// accepts. Returns `None` when the key does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn set_locked(&self, key: &str, locked: bool) -> SettingsResult<Option<Record>> {
        let Some(mut record) = self.storage.find_by_key(key).await? else {
            return Ok(None);
        };
        record.is_locked = locked;

        let saved = self.storage.upsert(&record).await?;
        self.invalidate(key).await?;
        Ok(Some(saved))
    }

    /// Replace the description. Refused when the record is locked. Returns
    /// `None` when the key does not exist.
    #[tracing::instrument(skip(self, description))]
    pub async fn describe(
        &self,
        key: &str,
        description: Option<String>,
    ) -> SettingsResult<Option<Record>> {
        let Some(mut record) = self.storage.find_by_key(key).await? else {
            return Ok(None);
        };
        if record.is_locked {
            return Err(refuse_locked(key));
        }
        record.description = description;

        let saved = self.storage.upsert(&record).await?;
        self.invalidate(key).await?;
        Ok(Some(saved))
    }

    // ========================================================================
    // CACHE CONTROL
    // ========================================================================

    /// Evict the cache entry for `key` whether or not the key exists.
    ///
    /// Does nothing when caching is disabled. A cache failure is returned to
    /// the caller.
    pub async fn clear_cache(&self, key: &str) -> SettingsResult<()> {
        if let Some(cache) = self.active_cache() {
            cache.delete(&self.cache_key(key)).await?;
        }
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> SettingsResult<()> {
        let mut attempt = 1;
        loop {
            match self.clear_cache(key).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < INVALIDATE_ATTEMPTS => {
                    tracing::debug!(error = %e, key, attempt, "Retrying cache eviction");
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        key,
                        "Setting written but its cache entry could not be evicted"
                    );
                    return Err(e);
                }
            }
        }
    }
}

fn refuse_locked(key: &str) -> SettingsError {
    tracing::info!(key, "Refusing to modify locked setting");
    SettingsError::locked(key)
}

impl fmt::Debug for SettingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingService")
            .field("cache_attached", &self.cache.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
