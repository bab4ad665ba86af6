//! Cache layer for setting reads.
//!
//! Caches hold decoded [`SettingValue`](setwise_core::SettingValue)s under a
//! [`CacheKey`] built from the configured prefix and the setting key. Every
//! backend implements [`CacheGateway`]; [`CacheStores`] maps the configured
//! store name to a backend instance.
//!
//! The cache is an optimisation only. The service treats every backend error
//! as a miss.

pub mod key;
pub mod lmdb;
pub mod memory;
pub mod stores;
pub mod traits;

pub use key::CacheKey;
pub use lmdb::LmdbCache;
pub use memory::InMemoryCache;
pub use stores::CacheStores;
pub use traits::{CacheGateway, CacheStats};
