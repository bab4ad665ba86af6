//! In-process cache backend

use super::key::CacheKey;
use super::traits::{CacheGateway, CacheStats};
use async_trait::async_trait;
use dashmap::DashMap;
use setwise_core::{SettingValue, SettingsResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: SettingValue,
    /// `None` when `now + ttl` overflows `Instant`
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// `DashMap`-backed cache with lazy per-entry expiry.
///
/// Expired entries are dropped when they are next read, or in bulk by
/// [`InMemoryCache::purge_expired`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, Entry>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len()) as u64;
        self.evictions.fetch_add(removed, Ordering::Relaxed);
        removed
    }
}

#[async_trait]
impl CacheGateway for InMemoryCache {
    async fn get(&self, key: &CacheKey) -> SettingsResult<Option<SettingValue>> {
        let now = Instant::now();

        // The shard guard must be released before remove_if below.
        let live = self
            .entries
            .get(key.as_str())
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));

        match live {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Some(None) => {
                if self
                    .entries
                    .remove_if(key.as_str(), |_, entry| !entry.is_live(now))
                    .is_some()
                {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: &SettingValue, ttl: Duration) -> SettingsResult<()> {
        let entry = Entry {
            value: value.clone(),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(key.as_str().to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> SettingsResult<()> {
        self.entries.remove(key.as_str());
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
