//! Persisted setting record

use crate::codec::{EncodedPayload, RawPayload};
use crate::identity::{new_record_id, RecordId, Timestamp};
use crate::SettingType;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Group assigned when the caller does not name one.
pub const DEFAULT_GROUP: &str = "general";

/// One row of the settings table.
///
/// Exactly one of `value` / `structured_value` is populated, selected by
/// `setting_type`. Use [`Record::apply_payload`] to change either column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub group: String,
    pub key: String,
    pub value: Option<String>,
    pub structured_value: Option<Value>,
    pub setting_type: SettingType,
    pub description: Option<String>,
    pub is_locked: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Record {
    /// Create an unsaved record with a fresh id and an empty string payload.
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            group: group.into(),
            key: key.into(),
            value: Some(String::new()),
            structured_value: None,
            setting_type: SettingType::String,
            description: None,
            is_locked: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder: set the lock flag.
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.is_locked = locked;
        self
    }

    /// Replace both payload columns and the type tag together.
    pub fn apply_payload(&mut self, payload: EncodedPayload, setting_type: SettingType) {
        self.value = payload.value;
        self.structured_value = payload.structured_value;
        self.setting_type = setting_type;
    }

    /// Borrow the raw columns for decoding.
    pub fn raw_payload(&self) -> RawPayload<'_> {
        RawPayload {
            value: self.value.as_deref(),
            structured_value: self.structured_value.as_ref(),
            setting_type: self.setting_type,
        }
    }

    /// Whether exactly the column selected by the type tag is populated.
    pub fn check_exclusivity(&self) -> bool {
        if self.setting_type.uses_structured_column() {
            self.value.is_none() && self.structured_value.is_some()
        } else {
            self.value.is_some() && self.structured_value.is_none()
        }
    }
}
