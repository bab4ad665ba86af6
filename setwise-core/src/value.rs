//! Typed setting payloads

use crate::SettingType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The application-level value a setting represents.
///
/// This is also the form held in caches, so a cache hit returns exactly what
/// a storage read would have decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Structured(Value),
}

impl SettingValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            SettingValue::Structured(v) => Some(v),
            _ => None,
        }
    }

    /// String form used by the scalar encoders.
    ///
    /// Booleans become `"1"`/`"0"`. A structured string is unwrapped, any
    /// other structured document is rendered as compact JSON.
    pub fn to_plain_string(&self) -> String {
        match self {
            SettingValue::String(s) => s.clone(),
            SettingValue::Integer(i) => i.to_string(),
            SettingValue::Float(f) => f.to_string(),
            SettingValue::Boolean(true) => "1".to_string(),
            SettingValue::Boolean(false) => "0".to_string(),
            SettingValue::Structured(Value::String(s)) => s.clone(),
            SettingValue::Structured(v) => v.to_string(),
        }
    }

    /// Convert into a JSON document for the structured column.
    pub fn to_json(&self) -> Value {
        match self {
            SettingValue::String(s) => Value::String(s.clone()),
            SettingValue::Integer(i) => Value::from(*i),
            SettingValue::Float(f) => {
                if !f.is_finite() {
                    tracing::debug!(value = %f, "non-finite float has no JSON form, using null");
                }
                Value::from(*f)
            }
            SettingValue::Boolean(b) => Value::Bool(*b),
            SettingValue::Structured(v) => v.clone(),
        }
    }

    /// The type this value maps to when the caller does not pick one.
    pub fn natural_type(&self) -> SettingType {
        match self {
            SettingValue::String(_) => SettingType::String,
            SettingValue::Integer(_) => SettingType::Integer,
            SettingValue::Float(_) => SettingType::Float,
            SettingValue::Boolean(_) => SettingType::Boolean,
            SettingValue::Structured(_) => SettingType::Array,
        }
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::String(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::String(s)
    }
}

impl From<i64> for SettingValue {
    fn from(i: i64) -> Self {
        SettingValue::Integer(i)
    }
}

impl From<i32> for SettingValue {
    fn from(i: i32) -> Self {
        SettingValue::Integer(i64::from(i))
    }
}

impl From<f64> for SettingValue {
    fn from(f: f64) -> Self {
        SettingValue::Float(f)
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Boolean(b)
    }
}

impl From<Value> for SettingValue {
    fn from(v: Value) -> Self {
        SettingValue::Structured(v)
    }
}
