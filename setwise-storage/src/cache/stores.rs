//! Named cache store registry
//!
//! Resolves the `cache.store` setting to a backend instance.

use super::traits::CacheGateway;
use setwise_core::{CacheError, SettingsResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Cache backends registered under a name.
#[derive(Clone, Default)]
pub struct CacheStores {
    stores: HashMap<String, Arc<dyn CacheGateway>>,
}

impl CacheStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register `store` under `name`.
    pub fn with_store(mut self, name: impl Into<String>, store: Arc<dyn CacheGateway>) -> Self {
        self.register(name, store);
        self
    }

    /// Register `store` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, store: Arc<dyn CacheGateway>) {
        self.stores.insert(name.into(), store);
    }

    /// Look up a store by name.
    pub fn resolve(&self, name: &str) -> SettingsResult<Arc<dyn CacheGateway>> {
        self.stores.get(name).cloned().ok_or_else(|| {
            CacheError::UnknownStore {
                store: name.to_string(),
            }
            .into()
        })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for CacheStores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStores")
            .field("stores", &self.names())
            .finish()
    }
}
