//! LMDB-backed cache backend.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep cached settings in a
//! memory-mapped file that survives restarts. Expiry is therefore tracked in
//! wall-clock milliseconds rather than `Instant`s.
//!
//! # Value layout
//!
//! `[expires_at_millis: 8 bytes LE][json SettingValue]`

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use setwise_core::{CacheError, SettingValue, SettingsResult};
use tracing::debug;

use super::key::CacheKey;
use super::traits::{CacheGateway, CacheStats};

const STORE_NAME: &str = "lmdb";
const HEADER_LEN: usize = 8;

fn unavailable(reason: impl ToString) -> CacheError {
    CacheError::Unavailable {
        store: STORE_NAME.to_string(),
        reason: reason.to_string(),
    }
}

enum Lookup {
    Live(SettingValue),
    Expired,
    Missing,
}

/// Persistent local cache.
pub struct LmdbCache {
    env: Env,
    db: Database<Bytes, Bytes>,
    stats: RwLock<CacheStats>,
}

impl LmdbCache {
    /// Open (or create) a cache in `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> SettingsResult<Self> {
        std::fs::create_dir_all(&path).map_err(unavailable)?;

        // SAFETY: the directory is owned by this cache and is not opened
        // twice in the same process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(unavailable)?;

        let mut wtxn = env.write_txn().map_err(unavailable)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(unavailable)?;
        wtxn.commit().map_err(unavailable)?;

        Ok(Self {
            env,
            db,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    /// Delete every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> SettingsResult<u64> {
        let now = Utc::now().timestamp_millis();

        let expired: Vec<Vec<u8>> = {
            let rtxn = self.env.read_txn().map_err(unavailable)?;
            let iter = self.db.iter(&rtxn).map_err(unavailable)?;
            let mut keys = Vec::new();
            for item in iter {
                let (key, bytes) = item.map_err(unavailable)?;
                if expires_at(bytes).map_or(true, |at| at <= now) {
                    keys.push(key.to_vec());
                }
            }
            keys
        };

        let mut wtxn = self.env.write_txn().map_err(unavailable)?;
        let mut removed = 0u64;
        for key in &expired {
            if self.db.delete(&mut wtxn, key).map_err(unavailable)? {
                removed += 1;
            }
        }
        wtxn.commit().map_err(unavailable)?;

        if let Ok(mut stats) = self.stats.write() {
            stats.evictions += removed;
        }
        debug!(removed, "purged expired lmdb cache entries");
        Ok(removed)
    }

    fn lookup(&self, key: &CacheKey) -> SettingsResult<Lookup> {
        let rtxn = self.env.read_txn().map_err(unavailable)?;
        let Some(bytes) = self.db.get(&rtxn, key.as_bytes()).map_err(unavailable)? else {
            return Ok(Lookup::Missing);
        };

        match expires_at(bytes) {
            Some(at) if at > Utc::now().timestamp_millis() => {
                let value = serde_json::from_slice(&bytes[HEADER_LEN..]).map_err(|e| {
                    CacheError::Serialization {
                        reason: e.to_string(),
                    }
                })?;
                Ok(Lookup::Live(value))
            }
            // Truncated entries are treated as expired and dropped.
            _ => Ok(Lookup::Expired),
        }
    }

    fn remove(&self, key: &CacheKey) -> SettingsResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(unavailable)?;
        let deleted = self.db.delete(&mut wtxn, key.as_bytes()).map_err(unavailable)?;
        wtxn.commit().map_err(unavailable)?;
        Ok(deleted)
    }

    fn record(&self, f: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }
}

fn expires_at(bytes: &[u8]) -> Option<i64> {
    let header: [u8; HEADER_LEN] = bytes.get(..HEADER_LEN)?.try_into().ok()?;
    Some(i64::from_le_bytes(header))
}

#[async_trait]
impl CacheGateway for LmdbCache {
    async fn get(&self, key: &CacheKey) -> SettingsResult<Option<SettingValue>> {
        match self.lookup(key)? {
            Lookup::Live(value) => {
                self.record(|s| s.hits += 1);
                Ok(Some(value))
            }
            Lookup::Expired => {
                let evicted = self.remove(key)?;
                self.record(|s| {
                    s.misses += 1;
                    if evicted {
                        s.evictions += 1;
                    }
                });
                Ok(None)
            }
            Lookup::Missing => {
                self.record(|s| s.misses += 1);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: &SettingValue, ttl: Duration) -> SettingsResult<()> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp_millis().saturating_add(ttl_millis);

        // serde_json writes these as null, which would never read back. The
        // previous entry is dropped so it cannot outlive the refused write.
        if let SettingValue::Float(f) = value {
            if !f.is_finite() {
                self.remove(key)?;
                return Err(CacheError::Serialization {
                    reason: format!("non-finite float {} cannot be cached", f),
                }
                .into());
            }
        }

        let body = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        let mut full = Vec::with_capacity(HEADER_LEN + body.len());
        full.extend_from_slice(&expires.to_le_bytes());
        full.extend_from_slice(&body);

        let mut wtxn = self.env.write_txn().map_err(unavailable)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &full)
            .map_err(unavailable)?;
        wtxn.commit().map_err(unavailable)?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> SettingsResult<()> {
        self.remove(key)?;
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        let entry_count = self
            .env
            .read_txn()
            .ok()
            .and_then(|rtxn| self.db.len(&rtxn).ok())
            .unwrap_or(0);

        let mut stats = self.stats.read().map(|s| s.clone()).unwrap_or_default();
        stats.entry_count = entry_count;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use setwise_core::SettingsError;
    use tempfile::TempDir;

    fn create_test_cache() -> (LmdbCache, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let cache = LmdbCache::open(temp_dir.path(), 10).expect("cache creation should succeed");
        (cache, temp_dir)
    }

    fn key(k: &str) -> CacheKey {
        CacheKey::new("setting_", k)
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (cache, _dir) = create_test_cache();
        let value = SettingValue::from(json!({"colors": ["red", "blue"]}));

        cache
            .set(&key("palette"), &value, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get(&key("palette")).await.unwrap(), Some(value));
        assert_eq!(cache.stats().entry_count, 1);

        cache.delete(&key("palette")).await.unwrap();
        assert_eq!(cache.get(&key("palette")).await.unwrap(), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test]
    async fn test_value_variants_survive_storage() {
        let (cache, _dir) = create_test_cache();
        let ttl = Duration::from_secs(60);
        let values = [
            SettingValue::from(3),
            SettingValue::from(3.25),
            SettingValue::from(false),
            SettingValue::from("3"),
        ];
        for (i, value) in values.iter().enumerate() {
            let k = key(&format!("k{i}"));
            cache.set(&k, value, ttl).await.unwrap();
            assert_eq!(cache.get(&k).await.unwrap().as_ref(), Some(value));
        }
    }

    #[tokio::test]
    async fn test_non_finite_float_is_refused() {
        let (cache, _dir) = create_test_cache();
        let ttl = Duration::from_secs(60);
        cache.set(&key("ratio"), &SettingValue::from(0.5), ttl).await.unwrap();

        for f in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let err = cache
                .set(&key("ratio"), &SettingValue::from(f), ttl)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                SettingsError::Cache(CacheError::Serialization { .. })
            ));
            assert_eq!(cache.get(&key("ratio")).await.unwrap(), None);
        }
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[tokio::test]
    async fn test_expired_entry_deleted_on_read() {
        let (cache, _dir) = create_test_cache();
        cache
            .set(&key("k"), &SettingValue::from(1), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(cache.get(&key("k")).await.unwrap(), None);
        let stats = cache.stats();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (cache, _dir) = create_test_cache();
        cache
            .set(&key("old"), &SettingValue::from(1), Duration::ZERO)
            .await
            .unwrap();
        cache
            .set(&key("new"), &SettingValue::from(2), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.stats().entry_count, 1);
    }

    #[tokio::test]
    async fn test_entries_persist_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let cache = LmdbCache::open(temp_dir.path(), 10).unwrap();
            cache
                .set(&key("k"), &SettingValue::from("kept"), Duration::from_secs(60))
                .await
                .unwrap();
        }
        let reopened = LmdbCache::open(temp_dir.path(), 10).unwrap();
        assert_eq!(
            reopened.get(&key("k")).await.unwrap(),
            Some(SettingValue::from("kept"))
        );
    }

    #[test]
    fn test_expires_at_rejects_short_buffers() {
        assert_eq!(expires_at(&[1, 2, 3]), None);
        assert_eq!(expires_at(&42i64.to_le_bytes()), Some(42));
    }
}
