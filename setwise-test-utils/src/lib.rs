//! Setwise Test Utilities
//!
//! Shared test infrastructure for the setwise workspace:
//! - Proptest generators for types, values and records
//! - Fixtures for a wired-up service over in-memory gateways
//! - Cache doubles that count or fail calls
//! - Custom assertions for setwise-specific conditions

// Re-export in-memory gateways from their source crate
pub use setwise_storage::{CacheGateway, CacheKey, CacheStats, InMemoryCache, MockStorage};

// Re-export core types for convenience
pub use setwise_core::{
    AesGcmCipher, CacheError, CacheSettings, PayloadCodec, Record, SettingType, SettingValue,
    SettingsError, SettingsResult, StorageError, DEFAULT_GROUP,
};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Install a test-friendly tracing subscriber once per process.
///
/// Honours `RUST_LOG`; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// CACHE DOUBLES
// ============================================================================

/// Wraps a cache and counts every call made through it.
#[derive(Clone)]
pub struct CountingCache {
    inner: Arc<dyn CacheGateway>,
    gets: Arc<AtomicUsize>,
    sets: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
}

impl CountingCache {
    pub fn new(inner: Arc<dyn CacheGateway>) -> Self {
        Self {
            inner,
            gets: Arc::new(AtomicUsize::new(0)),
            sets: Arc::new(AtomicUsize::new(0)),
            deletes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counting wrapper around a fresh [`InMemoryCache`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCache::new()))
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    pub fn calls(&self) -> usize {
        self.gets() + self.sets() + self.deletes()
    }
}

#[async_trait]
impl CacheGateway for CountingCache {
    async fn get(&self, key: &CacheKey) -> SettingsResult<Option<SettingValue>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, value: &SettingValue, ttl: Duration) -> SettingsResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &CacheKey) -> SettingsResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

/// Cache whose every call fails with `CacheError::Unavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingCache;

impl FailingCache {
    fn down() -> SettingsError {
        CacheError::Unavailable {
            store: "failing".to_string(),
            reason: "cache is down".to_string(),
        }
        .into()
    }
}

#[async_trait]
impl CacheGateway for FailingCache {
    async fn get(&self, _key: &CacheKey) -> SettingsResult<Option<SettingValue>> {
        Err(Self::down())
    }

    async fn set(&self, _key: &CacheKey, _value: &SettingValue, _ttl: Duration) -> SettingsResult<()> {
        Err(Self::down())
    }

    async fn delete(&self, _key: &CacheKey) -> SettingsResult<()> {
        Err(Self::down())
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Wraps a cache and fails `delete` while switched on. Reads and writes
/// pass through, so stale entries stay visible.
#[derive(Clone)]
pub struct EvictionFailingCache {
    inner: Arc<dyn CacheGateway>,
    failing: Arc<AtomicBool>,
    delete_attempts: Arc<AtomicUsize>,
}

impl EvictionFailingCache {
    /// Wrapper around a fresh [`InMemoryCache`], failing from the start.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(InMemoryCache::new()),
            failing: Arc::new(AtomicBool::new(true)),
            delete_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every `delete` call, failed or not.
    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheGateway for EvictionFailingCache {
    async fn get(&self, key: &CacheKey) -> SettingsResult<Option<SettingValue>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, value: &SettingValue, ttl: Duration) -> SettingsResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &CacheKey) -> SettingsResult<()> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                store: "eviction-failing".to_string(),
                reason: "delete rejected".to_string(),
            }
            .into());
        }
        self.inner.delete(key).await
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating setwise types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// Generate any setting type.
    pub fn arb_setting_type() -> impl Strategy<Value = SettingType> {
        prop::sample::select(SettingType::ALL.to_vec())
    }

    /// Generate a setting key such as `mail.smtp_port`.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}(\\.[a-z][a-z0-9_]{0,15}){0,2}".prop_map(|s| s)
    }

    /// Generate a group label.
    pub fn arb_group() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(DEFAULT_GROUP.to_string()),
            "[a-z]{1,12}".prop_map(|s| s),
        ]
    }

    /// Generate a JSON document with bounded depth. Numbers are integers so
    /// equality survives a round trip.
    pub fn arb_structured_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|i| json!(i)),
            "[a-zA-Z0-9 _-]{0,16}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 5, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..5)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Generate a non-structured value of any scalar variant.
    pub fn arb_scalar_value() -> impl Strategy<Value = SettingValue> {
        prop_oneof![
            ".{0,32}".prop_map(SettingValue::String),
            any::<i64>().prop_map(SettingValue::Integer),
            (prop::num::f64::NORMAL | prop::num::f64::ZERO).prop_map(SettingValue::Float),
            any::<bool>().prop_map(SettingValue::Boolean),
        ]
    }

    /// Generate a value that round-trips losslessly through `setting_type`.
    pub fn arb_value_for(setting_type: SettingType) -> BoxedStrategy<SettingValue> {
        match setting_type {
            SettingType::String | SettingType::Encrypted => {
                ".{0,32}".prop_map(SettingValue::String).boxed()
            }
            SettingType::Integer => any::<i64>().prop_map(SettingValue::Integer).boxed(),
            SettingType::Float => (prop::num::f64::NORMAL | prop::num::f64::ZERO)
                .prop_map(SettingValue::Float)
                .boxed(),
            SettingType::Boolean => any::<bool>().prop_map(SettingValue::Boolean).boxed(),
            SettingType::Array => arb_structured_value()
                .prop_map(SettingValue::Structured)
                .boxed(),
        }
    }

    /// Generate a typed `(type, value)` pair.
    pub fn arb_typed_value() -> impl Strategy<Value = (SettingType, SettingValue)> {
        arb_setting_type().prop_flat_map(|ty| (Just(ty), arb_value_for(ty)))
    }

    /// Generate a record whose columns were produced by the codec.
    pub fn arb_record() -> impl Strategy<Value = Record> {
        (
            arb_group(),
            arb_key(),
            arb_typed_value().prop_filter("encrypted needs a cipher", |(ty, _)| {
                *ty != SettingType::Encrypted
            }),
            prop::option::of("[a-zA-Z0-9 ]{1,40}".prop_map(|s| s)),
            any::<bool>(),
        )
            .prop_map(|(group, key, (ty, value), description, is_locked)| {
                let mut record = Record::new(group, key);
                if let Ok(payload) = PayloadCodec::without_cipher().encode(&value, ty) {
                    record.apply_payload(payload, ty);
                }
                record.description = description;
                record.is_locked = is_locked;
                record
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;
    use setwise_storage::SettingService;

    /// Fixed 32-byte key for deterministic cipher setup.
    pub fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    /// AES-GCM cipher over [`test_key`].
    pub fn test_cipher() -> Arc<AesGcmCipher> {
        Arc::new(AesGcmCipher::new(test_key()))
    }

    /// Codec using [`test_cipher`].
    pub fn test_codec() -> PayloadCodec {
        PayloadCodec::new(test_cipher())
    }

    /// A locked string record in the default group.
    pub fn locked_record(key: &str, value: &str) -> Record {
        let mut record = Record::new(DEFAULT_GROUP, key).with_locked(true);
        record.value = Some(value.to_string());
        record
    }

    /// Service over fresh in-memory storage and cache, default settings.
    pub fn service_with_memory_cache() -> (SettingService, MockStorage, InMemoryCache) {
        let storage = MockStorage::new();
        let cache = InMemoryCache::new();
        let service = SettingService::new(
            Arc::new(storage.clone()),
            Some(Arc::new(cache.clone())),
            test_codec(),
            CacheSettings::default(),
        );
        (service, storage, cache)
    }

    /// Service over fresh in-memory storage and the given cache.
    pub fn service_with_cache(
        cache: Arc<dyn CacheGateway>,
        settings: CacheSettings,
    ) -> (SettingService, MockStorage) {
        let storage = MockStorage::new();
        let service = SettingService::new(
            Arc::new(storage.clone()),
            Some(cache),
            test_codec(),
            settings,
        );
        (service, storage)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for setwise-specific validation.

    use super::*;

    /// Assert that a result is the locked-setting condition for `key`.
    #[track_caller]
    pub fn assert_locked<T: std::fmt::Debug>(result: &SettingsResult<T>, key: &str) {
        match result {
            Err(SettingsError::Locked { key: k }) => {
                assert_eq!(k, key, "Wrong key in Locked error");
            }
            other => panic!("Expected Locked error for {}, got: {:?}", key, other),
        }
    }

    /// Assert that a result is a retryable failure.
    #[track_caller]
    pub fn assert_retryable<T: std::fmt::Debug>(result: &SettingsResult<T>) {
        match result {
            Err(e) if e.is_retryable() => {}
            other => panic!("Expected retryable error, got: {:?}", other),
        }
    }

    /// Assert that exactly the column selected by the type tag is populated.
    #[track_caller]
    pub fn assert_exclusive_columns(record: &Record) {
        assert!(
            record.check_exclusivity(),
            "Column exclusivity violated for {} (type {}): value={:?} structured_value={:?}",
            record.key,
            record.setting_type,
            record.value,
            record.structured_value
        );
    }
}
