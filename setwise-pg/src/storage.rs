//! PostgreSQL storage gateway

use crate::row::{record_from_row, RECORD_COLUMNS};
use async_trait::async_trait;
use deadpool_postgres::{Object, Pool, PoolError};
use setwise_core::{Record, SettingsConfig, SettingsResult, StorageError};
use setwise_storage::StorageGateway;
use std::fmt;
use std::sync::Arc;

/// SQL text for one table, built once at construction.
#[derive(Debug)]
struct Statements {
    find: String,
    upsert: String,
    delete: String,
    exists: String,
    list_group: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        let table = quote_table(table);
        Self {
            find: format!("SELECT {RECORD_COLUMNS} FROM {table} WHERE key = $1"),
            upsert: format!(
                "INSERT INTO {table} \
                 (id, \"group\", key, value, structured_value, type, description, is_locked, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now()) \
                 ON CONFLICT (key) DO UPDATE SET \
                 value = EXCLUDED.value, \
                 structured_value = EXCLUDED.structured_value, \
                 type = EXCLUDED.type, \
                 description = EXCLUDED.description, \
                 is_locked = EXCLUDED.is_locked, \
                 updated_at = now() \
                 RETURNING {RECORD_COLUMNS}"
            ),
            delete: format!("DELETE FROM {table} WHERE key = $1"),
            exists: format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE key = $1)"),
            list_group: format!(
                "SELECT {RECORD_COLUMNS} FROM {table} WHERE \"group\" = $1 ORDER BY key"
            ),
        }
    }
}

/// Quote each dot-separated part of a table name as an identifier.
fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn pool_error(e: PoolError) -> StorageError {
    StorageError::Unavailable {
        reason: format!("Failed to get connection: {}", e),
    }
}

/// Server-side rejections are query failures. Everything else (closed
/// connections, I/O) means the database is unreachable.
fn query_error(operation: &str, e: tokio_postgres::Error) -> StorageError {
    match e.as_db_error() {
        Some(db) => StorageError::QueryFailed {
            operation: operation.to_string(),
            reason: format!("{} ({})", db.message(), db.code().code()),
        },
        None => StorageError::Unavailable {
            reason: e.to_string(),
        },
    }
}

/// `StorageGateway` backed by a PostgreSQL table.
#[derive(Clone)]
pub struct PgStorage {
    pool: Pool,
    statements: Arc<Statements>,
}

impl PgStorage {
    /// Gateway over `table_name`. The name is quoted, not validated; use
    /// [`PgStorage::from_config`] to validate it first.
    pub fn new(pool: Pool, table_name: &str) -> Self {
        Self {
            pool,
            statements: Arc::new(Statements::for_table(table_name)),
        }
    }

    /// Gateway over the validated `table_name` from `config`.
    pub fn from_config(pool: Pool, config: &SettingsConfig) -> SettingsResult<Self> {
        config.validate()?;
        Ok(Self::new(pool, &config.table_name))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn conn(&self) -> SettingsResult<Object> {
        Ok(self.pool.get().await.map_err(pool_error)?)
    }
}

#[async_trait]
impl StorageGateway for PgStorage {
    async fn find_by_key(&self, key: &str) -> SettingsResult<Option<Record>> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(self.statements.find.as_str(), &[&key])
            .await
            .map_err(|e| query_error("find_by_key", e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn upsert(&self, record: &Record) -> SettingsResult<Record> {
        let conn = self.conn().await?;
        let type_tag = record.setting_type.as_db_str();
        let row = conn
            .query_one(
                self.statements.upsert.as_str(),
                &[
                    &record.id,
                    &record.group,
                    &record.key,
                    &record.value,
                    &record.structured_value,
                    &type_tag,
                    &record.description,
                    &record.is_locked,
                ],
            )
            .await
            .map_err(|e| query_error("upsert", e))?;

        let saved = record_from_row(&row)?;
        tracing::debug!(key = %saved.key, setting_type = %saved.setting_type, "Setting row upserted");
        Ok(saved)
    }

    async fn delete_by_key(&self, key: &str) -> SettingsResult<u64> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute(self.statements.delete.as_str(), &[&key])
            .await
            .map_err(|e| query_error("delete_by_key", e))?;
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> SettingsResult<bool> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(self.statements.exists.as_str(), &[&key])
            .await
            .map_err(|e| query_error("exists", e))?;
        row.try_get(0).map_err(|e| {
            StorageError::InvalidRow {
                key: key.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn list_group(&self, group: &str) -> SettingsResult<Vec<Record>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(self.statements.list_group.as_str(), &[&group])
            .await
            .map_err(|e| query_error("list_group", e))?;

        rows.iter().map(record_from_row).collect()
    }
}

impl fmt::Debug for PgStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgStorage")
            .field("pool_size", &self.pool_size())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_table() {
        assert_eq!(quote_table("settings"), "\"settings\"");
        assert_eq!(quote_table("app.settings"), "\"app\".\"settings\"");
        assert_eq!(quote_table("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_statements_target_table() {
        let s = Statements::for_table("app.settings");
        for sql in [&s.find, &s.upsert, &s.delete, &s.exists, &s.list_group] {
            assert!(sql.contains("\"app\".\"settings\""), "{sql}");
        }
    }

    #[test]
    fn test_upsert_keeps_identity_columns() {
        let s = Statements::for_table("settings");
        let update = s.upsert.split("DO UPDATE SET").nth(1).unwrap();
        assert!(s.upsert.contains("ON CONFLICT (key)"));
        assert!(!update.contains("id ="));
        assert!(!update.contains("\"group\" ="));
        assert!(!update.contains("created_at ="));
        assert!(update.contains("updated_at = now()"));
        assert!(update.contains("RETURNING"));
    }

    #[test]
    fn test_group_column_is_quoted() {
        let s = Statements::for_table("settings");
        assert!(s.list_group.contains("WHERE \"group\" = $1 ORDER BY key"));
    }

    #[test]
    fn test_from_config_rejects_bad_table() {
        let pool = crate::DbConfig::default().create_pool().unwrap();
        let config = SettingsConfig {
            table_name: "settings; drop".to_string(),
            ..SettingsConfig::default()
        };
        assert!(PgStorage::from_config(pool, &config).is_err());
    }
}
