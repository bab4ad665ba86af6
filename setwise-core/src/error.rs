//! Error types for setwise operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage {operation} failed: {reason}")]
    QueryFailed { operation: String, reason: String },

    #[error("Invalid stored row for key {key}: {reason}")]
    InvalidRow { key: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache store {store} unavailable: {reason}")]
    Unavailable { store: String, reason: String },

    #[error("Cache serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Unknown cache store: {store}")]
    UnknownStore { store: String },
}

/// Cipher errors for encrypted payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("No cipher configured for encrypted settings")]
    NotConfigured,

    #[error("Invalid cipher key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Ciphertext encoding error: {0}")]
    Encoding(String),
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all setwise errors.
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Mutation attempted on a record flagged `is_locked`.
    #[error("Setting {key} is locked")]
    Locked { key: String },
}

impl SettingsError {
    /// Build the locked-setting condition for `key`.
    pub fn locked(key: impl Into<String>) -> Self {
        SettingsError::Locked { key: key.into() }
    }

    /// Whether the failure is transient and worth retrying at a higher layer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SettingsError::Storage(StorageError::Unavailable { .. })
                | SettingsError::Cache(CacheError::Unavailable { .. })
        )
    }

    /// Whether this is the locked-setting condition.
    pub fn is_locked(&self) -> bool {
        matches!(self, SettingsError::Locked { .. })
    }
}

/// Result type alias for setwise operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_unavailable() {
        let err = StorageError::Unavailable {
            reason: "connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Storage unavailable"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_cache_error_display_unknown_store() {
        let err = CacheError::UnknownStore {
            store: "redis".to_string(),
        };
        assert_eq!(format!("{}", err), "Unknown cache store: redis");
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "table_name".to_string(),
            value: "drop table".to_string(),
            reason: "must be an identifier".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("table_name"));
        assert!(msg.contains("drop table"));
        assert!(msg.contains("must be an identifier"));
    }

    #[test]
    fn test_locked_error_display() {
        let err = SettingsError::locked("site.name");
        assert_eq!(format!("{}", err), "Setting site.name is locked");
        assert!(err.is_locked());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        let storage = SettingsError::from(StorageError::Unavailable {
            reason: "timeout".to_string(),
        });
        assert!(storage.is_retryable());

        let cache = SettingsError::from(CacheError::Unavailable {
            store: "memory".to_string(),
            reason: "down".to_string(),
        });
        assert!(cache.is_retryable());

        let query = SettingsError::from(StorageError::QueryFailed {
            operation: "upsert".to_string(),
            reason: "syntax".to_string(),
        });
        assert!(!query.is_retryable());

        let cipher = SettingsError::from(CipherError::NotConfigured);
        assert!(!cipher.is_retryable());
    }

    #[test]
    fn test_settings_error_from_variants() {
        let storage = SettingsError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, SettingsError::Storage(_)));

        let cache = SettingsError::from(CacheError::Serialization {
            reason: "eof".to_string(),
        });
        assert!(matches!(cache, SettingsError::Cache(_)));

        let cipher = SettingsError::from(CipherError::Decrypt("tag".to_string()));
        assert!(matches!(cipher, SettingsError::Cipher(_)));

        let config = SettingsError::from(ConfigError::MissingRequired {
            field: "cache.store".to_string(),
        });
        assert!(matches!(config, SettingsError::Config(_)));
    }
}
