//! Payload codec: typed values to and from the two storage columns
//!
//! Every setting is stored as a nullable text column plus a nullable JSON
//! column, tagged with a [`SettingType`]. This module owns the whole mapping.
//! Dispatch goes through one static table with an `(encode, decode)` pair per
//! type, indexed by the tag.
//!
//! Decoding never fails. Malformed numbers become zero, unknown booleans
//! become false, and ciphertext that cannot be decrypted is handed back
//! unchanged.

use crate::cipher::{Cipher, NoCipher};
use crate::error::SettingsResult;
use crate::record::Record;
use crate::{SettingType, SettingValue};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Borrowed view of a record's payload columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPayload<'a> {
    pub value: Option<&'a str>,
    pub structured_value: Option<&'a Value>,
    pub setting_type: SettingType,
}

/// Column contents produced by encoding. Exactly one side is populated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncodedPayload {
    pub value: Option<String>,
    pub structured_value: Option<Value>,
}

impl EncodedPayload {
    fn scalar(value: String) -> Self {
        Self {
            value: Some(value),
            structured_value: None,
        }
    }

    fn structured(value: Value) -> Self {
        Self {
            value: None,
            structured_value: Some(value),
        }
    }
}

// ============================================================================
// DISPATCH TABLE
// ============================================================================

type EncodeFn = fn(&SettingValue, &dyn Cipher) -> SettingsResult<EncodedPayload>;
type DecodeFn = fn(&RawPayload<'_>, &dyn Cipher) -> SettingValue;

struct TypeCodec {
    encode: EncodeFn,
    decode: DecodeFn,
}

/// Indexed by [`SettingType::index`], same order as [`SettingType::ALL`].
static CODECS: [TypeCodec; 6] = [
    TypeCodec {
        encode: encode_string,
        decode: decode_string,
    },
    TypeCodec {
        encode: encode_integer,
        decode: decode_integer,
    },
    TypeCodec {
        encode: encode_float,
        decode: decode_float,
    },
    TypeCodec {
        encode: encode_boolean,
        decode: decode_boolean,
    },
    TypeCodec {
        encode: encode_array,
        decode: decode_array,
    },
    TypeCodec {
        encode: encode_encrypted,
        decode: decode_encrypted,
    },
];

fn codec_for(setting_type: SettingType) -> &'static TypeCodec {
    &CODECS[setting_type.index()]
}

// ============================================================================
// PAYLOAD CODEC
// ============================================================================

/// Encodes and decodes setting payloads. Cheap to clone.
#[derive(Clone)]
pub struct PayloadCodec {
    cipher: Arc<dyn Cipher>,
}

impl PayloadCodec {
    pub fn new(cipher: Arc<dyn Cipher>) -> Self {
        Self { cipher }
    }

    /// Codec whose `encrypted` type always fails to encode.
    pub fn without_cipher() -> Self {
        Self::new(Arc::new(NoCipher))
    }

    /// Encode `value` as `setting_type`.
    ///
    /// Only the `encrypted` type can fail, when the cipher refuses.
    pub fn encode(
        &self,
        value: &SettingValue,
        setting_type: SettingType,
    ) -> SettingsResult<EncodedPayload> {
        (codec_for(setting_type).encode)(value, self.cipher.as_ref())
    }

    /// Decode raw columns. Never fails.
    pub fn decode(&self, raw: RawPayload<'_>) -> SettingValue {
        (codec_for(raw.setting_type).decode)(&raw, self.cipher.as_ref())
    }

    pub fn decode_record(&self, record: &Record) -> SettingValue {
        self.decode(record.raw_payload())
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::without_cipher()
    }
}

impl fmt::Debug for PayloadCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadCodec").finish_non_exhaustive()
    }
}

// ============================================================================
// ENCODERS
// ============================================================================

fn encode_string(value: &SettingValue, _: &dyn Cipher) -> SettingsResult<EncodedPayload> {
    Ok(EncodedPayload::scalar(value.to_plain_string()))
}

fn encode_integer(value: &SettingValue, _: &dyn Cipher) -> SettingsResult<EncodedPayload> {
    Ok(EncodedPayload::scalar(integer_of(value).to_string()))
}

fn encode_float(value: &SettingValue, _: &dyn Cipher) -> SettingsResult<EncodedPayload> {
    Ok(EncodedPayload::scalar(float_of(value).to_string()))
}

fn encode_boolean(value: &SettingValue, _: &dyn Cipher) -> SettingsResult<EncodedPayload> {
    let canonical = if bool_of(value) { "1" } else { "0" };
    Ok(EncodedPayload::scalar(canonical.to_string()))
}

fn encode_array(value: &SettingValue, _: &dyn Cipher) -> SettingsResult<EncodedPayload> {
    Ok(EncodedPayload::structured(value.to_json()))
}

fn encode_encrypted(value: &SettingValue, cipher: &dyn Cipher) -> SettingsResult<EncodedPayload> {
    let ciphertext = cipher.encrypt(&value.to_plain_string())?;
    Ok(EncodedPayload::scalar(ciphertext))
}

// ============================================================================
// DECODERS
// ============================================================================

/// Text for the scalar decoders. Falls back to the structured column when the
/// scalar one is empty, which only happens for rows written outside this codec.
fn scalar_text<'a>(raw: &RawPayload<'a>) -> Option<Cow<'a, str>> {
    if let Some(text) = raw.value {
        return Some(Cow::Borrowed(text));
    }
    match raw.structured_value {
        Some(Value::String(s)) => Some(Cow::Borrowed(s.as_str())),
        Some(Value::Null) | None => None,
        Some(other) => Some(Cow::Owned(other.to_string())),
    }
}

fn missing(raw: &RawPayload<'_>) {
    debug!(setting_type = %raw.setting_type, "payload column empty, using zero value");
}

fn decode_string(raw: &RawPayload<'_>, _: &dyn Cipher) -> SettingValue {
    match scalar_text(raw) {
        Some(text) => SettingValue::String(text.into_owned()),
        None => {
            missing(raw);
            SettingValue::String(String::new())
        }
    }
}

fn decode_integer(raw: &RawPayload<'_>, _: &dyn Cipher) -> SettingValue {
    match scalar_text(raw) {
        Some(text) => SettingValue::Integer(coerce_integer(&text)),
        None => {
            missing(raw);
            SettingValue::Integer(0)
        }
    }
}

fn decode_float(raw: &RawPayload<'_>, _: &dyn Cipher) -> SettingValue {
    match scalar_text(raw) {
        Some(text) => SettingValue::Float(coerce_float(&text)),
        None => {
            missing(raw);
            SettingValue::Float(0.0)
        }
    }
}

fn decode_boolean(raw: &RawPayload<'_>, _: &dyn Cipher) -> SettingValue {
    match scalar_text(raw) {
        Some(text) => SettingValue::Boolean(coerce_boolean(&text)),
        None => {
            missing(raw);
            SettingValue::Boolean(false)
        }
    }
}

fn decode_array(raw: &RawPayload<'_>, _: &dyn Cipher) -> SettingValue {
    if let Some(doc) = raw.structured_value {
        return SettingValue::Structured(doc.clone());
    }
    let parsed = raw
        .value
        .and_then(|text| serde_json::from_str::<Value>(text).ok());
    match parsed {
        Some(doc) => SettingValue::Structured(doc),
        None => {
            missing(raw);
            SettingValue::Structured(Value::Null)
        }
    }
}

fn decode_encrypted(raw: &RawPayload<'_>, cipher: &dyn Cipher) -> SettingValue {
    let Some(ciphertext) = scalar_text(raw) else {
        missing(raw);
        return SettingValue::String(String::new());
    };
    match cipher.decrypt(&ciphertext) {
        Ok(plaintext) => SettingValue::String(plaintext),
        Err(e) => {
            warn!(error = %e, "failed to decrypt setting, returning raw ciphertext");
            SettingValue::String(ciphertext.into_owned())
        }
    }
}

// ============================================================================
// PERMISSIVE COERCION
// ============================================================================

/// Parse an integer without ever failing.
///
/// Tries, in order: a plain decimal, a finite float truncated toward zero
/// (saturating), the leading `[+-]digits` prefix. Anything else is `0`.
pub fn coerce_integer(text: &str) -> i64 {
    let t = text.trim();
    if let Ok(i) = t.parse::<i64>() {
        return i;
    }
    if let Ok(f) = t.parse::<f64>() {
        if f.is_finite() {
            return f as i64;
        }
    }
    match leading_integer(t) {
        Some(i) => i,
        None => {
            debug!(input = t, "non-numeric integer payload, using 0");
            0
        }
    }
}

/// Parse a float without ever failing.
///
/// Tries a full parse, then the leading `[+-]digits[.digits][e[+-]digits]`
/// prefix. Anything else is `0.0`.
pub fn coerce_float(text: &str) -> f64 {
    let t = text.trim();
    if let Ok(f) = t.parse::<f64>() {
        return f;
    }
    match leading_float(t) {
        Some(f) => f,
        None => {
            debug!(input = t, "non-numeric float payload, using 0.0");
            0.0
        }
    }
}

/// `1`, `true`, `yes`, `on` (case-insensitive, trimmed) are true. Everything
/// else is false.
pub fn coerce_boolean(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn leading_integer(t: &str) -> Option<i64> {
    let bytes = t.as_bytes();
    let start = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let end = start + digit_run(&bytes[start..]);
    if end == start {
        return None;
    }
    let prefix = &t[..end];
    let saturated = if prefix.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    };
    Some(prefix.parse::<i64>().unwrap_or(saturated))
}

fn leading_float(t: &str) -> Option<f64> {
    let bytes = t.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    let int_digits = digit_run(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digit_run(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = digit_run(&bytes[exp_end.min(bytes.len())..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    t[..end].parse::<f64>().ok()
}

fn digit_run(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn integer_of(value: &SettingValue) -> i64 {
    match value {
        SettingValue::Integer(i) => *i,
        SettingValue::Float(f) => float_to_integer(*f),
        SettingValue::Boolean(b) => i64::from(*b),
        SettingValue::String(s) => coerce_integer(s),
        SettingValue::Structured(Value::Number(n)) => n
            .as_i64()
            .unwrap_or_else(|| n.as_f64().map(float_to_integer).unwrap_or(0)),
        SettingValue::Structured(Value::String(s)) => coerce_integer(s),
        SettingValue::Structured(Value::Bool(b)) => i64::from(*b),
        SettingValue::Structured(_) => 0,
    }
}

fn float_to_integer(f: f64) -> i64 {
    if f.is_finite() {
        f as i64
    } else {
        0
    }
}

fn float_of(value: &SettingValue) -> f64 {
    match value {
        SettingValue::Float(f) => *f,
        SettingValue::Integer(i) => *i as f64,
        SettingValue::Boolean(b) => f64::from(u8::from(*b)),
        SettingValue::String(s) => coerce_float(s),
        SettingValue::Structured(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        SettingValue::Structured(Value::String(s)) => coerce_float(s),
        SettingValue::Structured(Value::Bool(b)) => f64::from(u8::from(*b)),
        SettingValue::Structured(_) => 0.0,
    }
}

fn bool_of(value: &SettingValue) -> bool {
    match value {
        SettingValue::Boolean(b) => *b,
        SettingValue::Integer(i) => *i != 0,
        SettingValue::Float(f) => *f != 0.0,
        SettingValue::String(s) => coerce_boolean(s),
        SettingValue::Structured(Value::Bool(b)) => *b,
        SettingValue::Structured(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        SettingValue::Structured(Value::String(s)) => coerce_boolean(s),
        SettingValue::Structured(_) => false,
    }
}

// ============================================================================
// TESTS
// ============================================================================
