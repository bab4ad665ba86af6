//! Setwise Core - Setting Types and Payload Policy
//!
//! Pure data structures plus the typed payload codec. Nothing in this crate
//! performs I/O; storage and cache access live in setwise-storage.

pub mod cipher;
pub mod codec;
pub mod config;
pub mod error;
pub mod identity;
pub mod record;
pub mod setting_type;
pub mod value;

pub use cipher::{AesGcmCipher, Cipher, NoCipher};
pub use codec::{
    coerce_boolean, coerce_float, coerce_integer, EncodedPayload, PayloadCodec, RawPayload,
};
pub use config::{CacheSettings, SettingsConfig, DEFAULT_STORE};
pub use error::{
    CacheError, CipherError, ConfigError, SettingsError, SettingsResult, StorageError,
};
pub use identity::{new_record_id, RecordId, Timestamp};
pub use record::{Record, DEFAULT_GROUP};
pub use setting_type::{SettingType, SettingTypeParseError};
pub use value::SettingValue;
