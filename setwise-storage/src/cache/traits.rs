//! Cache gateway contract

use super::key::CacheKey;
use async_trait::async_trait;
use setwise_core::{SettingValue, SettingsResult};
use std::time::Duration;

/// Key-value cache with per-entry TTL. No cross-key guarantees.
#[async_trait]
pub trait CacheGateway: Send + Sync {
    /// Fetch a live entry. Expired entries are misses.
    async fn get(&self, key: &CacheKey) -> SettingsResult<Option<SettingValue>>;

    /// Store `value` for `ttl`, replacing any existing entry.
    async fn set(&self, key: &CacheKey, value: &SettingValue, ttl: Duration) -> SettingsResult<()>;

    /// Remove the entry if present.
    async fn delete(&self, key: &CacheKey) -> SettingsResult<()>;

    /// Snapshot of usage counters.
    fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries dropped because they expired.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);

        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
