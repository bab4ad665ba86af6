//! Cache keys
//!
//! A [`CacheKey`] can only be built from a prefix and a setting key, so every
//! backend sees the same derived name for the same setting.

use std::fmt;

/// Prefixed cache key for one setting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `prefix` followed by `key`.
    pub fn new(prefix: &str, key: &str) -> Self {
        let mut derived = String::with_capacity(prefix.len() + key.len());
        derived.push_str(prefix);
        derived.push_str(key);
        Self(derived)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
