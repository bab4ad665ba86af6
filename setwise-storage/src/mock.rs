//! In-memory storage gateway for tests and embedded use

use crate::gateway::StorageGateway;
use async_trait::async_trait;
use chrono::Utc;
use setwise_core::{Record, SettingsResult, StorageError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory mock storage keyed by setting key.
#[derive(Debug, Clone, Default)]
pub struct MockStorage {
    records: Arc<RwLock<HashMap<String, Record>>>,
    unavailable: Arc<AtomicBool>,
}

impl MockStorage {
    /// Create a new mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StorageError::Unavailable`
    /// until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a record verbatim, bypassing upsert semantics.
    pub fn seed(&self, record: Record) -> SettingsResult<()> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        records.insert(record.key.clone(), record);
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }

    fn check_available(&self) -> SettingsResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "mock storage switched off".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl StorageGateway for MockStorage {
    async fn find_by_key(&self, key: &str) -> SettingsResult<Option<Record>> {
        self.check_available()?;
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.get(key).cloned())
    }

    async fn upsert(&self, record: &Record) -> SettingsResult<Record> {
        self.check_available()?;
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        let now = Utc::now();

        let stored = match records.get(&record.key) {
            Some(existing) => Record {
                id: existing.id,
                group: existing.group.clone(),
                created_at: existing.created_at,
                updated_at: now,
                ..record.clone()
            },
            None => Record {
                created_at: now,
                updated_at: now,
                ..record.clone()
            },
        };

        records.insert(stored.key.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete_by_key(&self, key: &str) -> SettingsResult<u64> {
        self.check_available()?;
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(u64::from(records.remove(key).is_some()))
    }

    async fn list_group(&self, group: &str) -> SettingsResult<Vec<Record>> {
        self.check_available()?;
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut matching: Vec<Record> = records
            .values()
            .filter(|r| r.group == group)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use setwise_core::{SettingType, SettingsError};

    #[tokio::test]
    async fn test_upsert_inserts_then_updates_in_place() {
        let storage = MockStorage::new();
        let first = storage.upsert(&Record::new("ui", "theme")).await.unwrap();

        let mut change = Record::new("other", "theme");
        change.value = Some("dark".to_string());
        let second = storage.upsert(&change).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.group, "ui");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.value.as_deref(), Some("dark"));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rewrites_type_and_columns() {
        let storage = MockStorage::new();
        storage.upsert(&Record::new("g", "k")).await.unwrap();

        let mut change = Record::new("g", "k");
        change.value = None;
        change.structured_value = Some(serde_json::json!([1]));
        change.setting_type = SettingType::Array;
        storage.upsert(&change).await.unwrap();

        let stored = storage.find_by_key("k").await.unwrap().unwrap();
        assert_eq!(stored.setting_type, SettingType::Array);
        assert!(stored.value.is_none());
        assert!(stored.check_exclusivity());
    }

    #[tokio::test]
    async fn test_delete_reports_rows() {
        let storage = MockStorage::new();
        storage.upsert(&Record::new("g", "k")).await.unwrap();

        assert_eq!(storage.delete_by_key("k").await.unwrap(), 1);
        assert_eq!(storage.delete_by_key("k").await.unwrap(), 0);
        assert!(!storage.exists("k").await.unwrap());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_list_group_sorted_by_key() {
        let storage = MockStorage::new();
        for key in ["b", "a", "c"] {
            storage.upsert(&Record::new("mail", key)).await.unwrap();
        }
        storage.upsert(&Record::new("ui", "z")).await.unwrap();

        let keys: Vec<String> = storage
            .list_group("mail")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let storage = MockStorage::new();
        storage.set_unavailable(true);

        let err = storage.find_by_key("k").await.unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Storage(StorageError::Unavailable { .. })
        ));
        assert!(storage.upsert(&Record::new("g", "k")).await.is_err());

        storage.set_unavailable(false);
        assert!(storage.find_by_key("k").await.unwrap().is_none());
    }

    #[test]
    fn test_seed_and_clear() {
        let storage = MockStorage::new();
        storage.seed(Record::new("g", "k")).unwrap();
        assert_eq!(storage.len(), 1);
        storage.clear();
        assert!(storage.is_empty());
    }
}
