//! Setting type tag

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type tag stored beside every record. Drives how the two payload columns
/// are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    /// Plain text, stored as-is
    #[default]
    String,
    /// Signed 64-bit integer, stored as decimal text
    Integer,
    /// 64-bit float, stored as text
    Float,
    /// Boolean, stored as "1" / "0"
    Boolean,
    /// Structured JSON document, stored in the structured column
    Array,
    /// Ciphertext produced by the configured cipher
    Encrypted,
}

impl SettingType {
    /// Every variant, in dispatch-table order.
    pub const ALL: [SettingType; 6] = [
        SettingType::String,
        SettingType::Integer,
        SettingType::Float,
        SettingType::Boolean,
        SettingType::Array,
        SettingType::Encrypted,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SettingType::String => "string",
            SettingType::Integer => "integer",
            SettingType::Float => "float",
            SettingType::Boolean => "boolean",
            SettingType::Array => "array",
            SettingType::Encrypted => "encrypted",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, SettingTypeParseError> {
        match s.trim().to_lowercase().as_str() {
            "string" => Ok(SettingType::String),
            "integer" | "int" => Ok(SettingType::Integer),
            "float" | "double" => Ok(SettingType::Float),
            "boolean" | "bool" => Ok(SettingType::Boolean),
            "array" | "json" | "object" => Ok(SettingType::Array),
            "encrypted" => Ok(SettingType::Encrypted),
            _ => Err(SettingTypeParseError(s.to_string())),
        }
    }

    /// Position of this variant in [`SettingType::ALL`].
    pub(crate) fn index(self) -> usize {
        match self {
            SettingType::String => 0,
            SettingType::Integer => 1,
            SettingType::Float => 2,
            SettingType::Boolean => 3,
            SettingType::Array => 4,
            SettingType::Encrypted => 5,
        }
    }

    /// True when the payload lives in `structured_value` rather than `value`.
    pub fn uses_structured_column(&self) -> bool {
        matches!(self, SettingType::Array)
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for SettingType {
    type Err = SettingTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid setting type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingTypeParseError(pub String);

impl fmt::Display for SettingTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid setting type: {}", self.0)
    }
}

impl std::error::Error for SettingTypeParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_str_round_trip() {
        for ty in SettingType::ALL {
            assert_eq!(SettingType::from_db_str(ty.as_db_str()), Ok(ty));
            assert_eq!(ty.to_string().parse::<SettingType>(), Ok(ty));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive_with_aliases() {
        assert_eq!(SettingType::from_db_str("INTEGER"), Ok(SettingType::Integer));
        assert_eq!(SettingType::from_db_str(" Bool "), Ok(SettingType::Boolean));
        assert_eq!(SettingType::from_db_str("json"), Ok(SettingType::Array));
        assert_eq!(SettingType::from_db_str("double"), Ok(SettingType::Float));
    }

    #[test]
    fn test_parse_unknown_fails() {
        let err = SettingType::from_db_str("blob").unwrap_err();
        assert_eq!(err, SettingTypeParseError("blob".to_string()));
        assert_eq!(err.to_string(), "Invalid setting type: blob");
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, ty) in SettingType::ALL.iter().enumerate() {
            assert_eq!(ty.index(), i);
        }
    }

    #[test]
    fn test_only_array_uses_structured_column() {
        let structured: Vec<_> = SettingType::ALL
            .into_iter()
            .filter(|t| t.uses_structured_column())
            .collect();
        assert_eq!(structured, vec![SettingType::Array]);
        assert_eq!(SettingType::default(), SettingType::String);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&SettingType::Encrypted).unwrap();
        assert_eq!(json, "\"encrypted\"");
    }
}
