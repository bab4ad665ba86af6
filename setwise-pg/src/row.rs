//! Row to record conversion

use chrono::{DateTime, Utc};
use serde_json::Value;
use setwise_core::{Record, SettingType, SettingsResult, StorageError};
use tokio_postgres::Row;
use uuid::Uuid;

/// Column list shared by every statement that returns records.
pub const RECORD_COLUMNS: &str =
    r#"id, "group", key, value, structured_value, type, description, is_locked, created_at, updated_at"#;

/// Convert a row selected with [`RECORD_COLUMNS`] into a [`Record`].
pub fn record_from_row(row: &Row) -> SettingsResult<Record> {
    let key: String = column(row, "key", "<unknown>")?;

    let type_tag: String = column(row, "type", &key)?;
    let setting_type = SettingType::from_db_str(&type_tag).map_err(|e| StorageError::InvalidRow {
        key: key.clone(),
        reason: e.to_string(),
    })?;

    Ok(Record {
        id: column::<Uuid>(row, "id", &key)?,
        group: column(row, "group", &key)?,
        value: column::<Option<String>>(row, "value", &key)?,
        structured_value: column::<Option<Value>>(row, "structured_value", &key)?,
        setting_type,
        description: column(row, "description", &key)?,
        is_locked: column(row, "is_locked", &key)?,
        created_at: column::<DateTime<Utc>>(row, "created_at", &key)?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at", &key)?,
        key,
    })
}

fn column<'a, T>(row: &'a Row, name: &str, key: &str) -> SettingsResult<T>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(name).map_err(|e| {
        StorageError::InvalidRow {
            key: key.to_string(),
            reason: format!("column {}: {}", name, e),
        }
        .into()
    })
}
