//! Storage gateway contract

use async_trait::async_trait;
use setwise_core::{Record, SettingsResult};

/// Key-indexed access to setting records.
///
/// Keys are unique across the whole store. Implementations maintain
/// `created_at` / `updated_at` themselves.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Point lookup by key.
    async fn find_by_key(&self, key: &str) -> SettingsResult<Option<Record>>;

    /// Insert the record, or update every mutable column of the record that
    /// already holds `record.key`. Returns the row as persisted.
    ///
    /// On update the stored `id`, `group` and `created_at` are kept.
    async fn upsert(&self, record: &Record) -> SettingsResult<Record>;

    /// Delete by key, returning the number of rows removed.
    async fn delete_by_key(&self, key: &str) -> SettingsResult<u64>;

    /// Existence check.
    async fn exists(&self, key: &str) -> SettingsResult<bool> {
        Ok(self.find_by_key(key).await?.is_some())
    }

    /// All records of one group, ordered by key.
    async fn list_group(&self, group: &str) -> SettingsResult<Vec<Record>>;
}
