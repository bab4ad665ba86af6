//! Settings configuration
//!
//! Values are read once at startup and never change afterwards.

use crate::codec::coerce_boolean;
use crate::error::{ConfigError, SettingsError, SettingsResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache store used when none is configured.
pub const DEFAULT_STORE: &str = "memory";

/// Plain SQL identifier, optionally schema-qualified once.
static TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("Invalid table name regex")
});

/// Cache behaviour for setting reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Bypass the cache entirely when false
    pub enabled: bool,
    /// Name of the cache store to resolve
    pub store: String,
    /// Lifetime of a cached entry
    #[serde(with = "ttl_secs")]
    pub ttl: Duration,
    /// Prepended to every key to form the cache key
    pub prefix: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            store: DEFAULT_STORE.to_string(),
            ttl: Duration::from_secs(3600),
            prefix: "setting_".to_string(),
        }
    }
}

impl CacheSettings {
    /// Builder: disable caching.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Builder: set the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Builder: set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Builder: set the store name.
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = store.into();
        self
    }
}

/// Top-level settings configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Table backing setting records
    pub table_name: String,
    pub cache: CacheSettings,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            table_name: "settings".to_string(),
            cache: CacheSettings::default(),
        }
    }
}

impl SettingsConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup, using the `SETWISE_*` names.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let table_name = lookup("SETWISE_TABLE_NAME").unwrap_or(defaults.table_name);

        let enabled = lookup("SETWISE_CACHE_ENABLED")
            .map(|s| coerce_boolean(&s))
            .unwrap_or(defaults.cache.enabled);

        let store = lookup("SETWISE_CACHE_STORE").unwrap_or(defaults.cache.store);

        let ttl = lookup("SETWISE_CACHE_TTL")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache.ttl);

        let prefix = lookup("SETWISE_CACHE_PREFIX").unwrap_or(defaults.cache.prefix);

        Self {
            table_name,
            cache: CacheSettings {
                enabled,
                store,
                ttl,
                prefix,
            },
        }
    }

    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(input: &str) -> SettingsResult<Self> {
        toml::from_str(input).map_err(|e| {
            SettingsError::Config(ConfigError::Parse {
                reason: e.to_string(),
            })
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SettingsResult<()> {
        if !TABLE_NAME_RE.is_match(&self.table_name) {
            return Err(SettingsError::Config(ConfigError::InvalidValue {
                field: "table_name".to_string(),
                value: self.table_name.clone(),
                reason: "table_name must be a plain SQL identifier".to_string(),
            }));
        }

        if self.cache.store.trim().is_empty() {
            return Err(SettingsError::Config(ConfigError::MissingRequired {
                field: "cache.store".to_string(),
            }));
        }

        if self.cache.enabled && self.cache.ttl.is_zero() {
            return Err(SettingsError::Config(ConfigError::InvalidValue {
                field: "cache.ttl".to_string(),
                value: format!("{:?}", self.cache.ttl),
                reason: "cache.ttl must be positive when caching is enabled".to_string(),
            }));
        }

        Ok(())
    }
}

mod ttl_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(ttl.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
