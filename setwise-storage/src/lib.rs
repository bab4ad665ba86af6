//! Setwise Storage - Gateways, Cache Backends, and the Setting Service
//!
//! `setwise-core` decides how a value is laid out in a record. This crate
//! decides where records and cached values live and in which order the two
//! are consulted.

pub mod cache;
pub mod gateway;
pub mod mock;
pub mod service;

pub use cache::{CacheGateway, CacheKey, CacheStats, CacheStores, InMemoryCache, LmdbCache};
pub use gateway::StorageGateway;
pub use mock::MockStorage;
pub use service::SettingService;
