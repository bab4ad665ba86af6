//! PgStorage against a live PostgreSQL server.
//!
//! Run with `--features db-tests` and the `SETWISE_DB_*` variables pointing
//! at a scratch database.

#![cfg(feature = "db-tests")]

use std::sync::Arc;

use serde_json::json;
use setwise_core::{Record, SettingType, SettingValue, SettingsResult, DEFAULT_GROUP};
use setwise_pg::{DbConfig, PgStorage};
use setwise_storage::{InMemoryCache, SettingService, StorageGateway};
use setwise_test_utils::assertions::{assert_exclusive_columns, assert_locked};
use setwise_test_utils::fixtures::test_codec;
use setwise_test_utils::CacheSettings;
use uuid::Uuid;

/// Create a uniquely named table so tests can run in parallel.
async fn scratch_storage() -> SettingsResult<PgStorage> {
    let pool = DbConfig::from_env().create_pool()?;
    let table = format!("settings_test_{}", Uuid::now_v7().simple());

    let conn = pool.get().await.expect("database should be reachable");
    conn.batch_execute(&format!(
        r#"CREATE TABLE {table} (
            id uuid PRIMARY KEY,
            "group" text NOT NULL DEFAULT 'general',
            key text NOT NULL UNIQUE,
            value text NULL,
            structured_value jsonb NULL,
            type text NOT NULL DEFAULT 'string',
            description text NULL,
            is_locked boolean NOT NULL DEFAULT false,
            created_at timestamptz NOT NULL,
            updated_at timestamptz NOT NULL
        )"#
    ))
    .await
    .expect("scratch table should be created");

    Ok(PgStorage::new(pool, &table))
}

#[tokio::test]
async fn test_upsert_find_delete() -> SettingsResult<()> {
    let storage = scratch_storage().await?;

    let mut record = Record::new("ui", "theme");
    record.value = Some("dark".to_string());
    let inserted = storage.upsert(&record).await?;
    assert_eq!(inserted.id, record.id);
    assert!(storage.exists("theme").await?);

    let mut change = Record::new("other", "theme");
    change.value = None;
    change.structured_value = Some(json!({"mode": "dark"}));
    change.setting_type = SettingType::Array;
    let updated = storage.upsert(&change).await?;

    assert_eq!(updated.id, inserted.id);
    assert_eq!(updated.group, "ui");
    assert_eq!(updated.created_at, inserted.created_at);
    assert!(updated.updated_at >= inserted.updated_at);
    assert_exclusive_columns(&updated);

    assert_eq!(storage.delete_by_key("theme").await?, 1);
    assert_eq!(storage.delete_by_key("theme").await?, 0);
    assert!(storage.find_by_key("theme").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_list_group_ordered() -> SettingsResult<()> {
    let storage = scratch_storage().await?;
    for key in ["mail.b", "mail.a"] {
        storage.upsert(&Record::new("mail", key)).await?;
    }
    storage.upsert(&Record::new(DEFAULT_GROUP, "site")).await?;

    let keys: Vec<String> = storage
        .list_group("mail")
        .await?
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(keys, vec!["mail.a", "mail.b"]);
    Ok(())
}

#[tokio::test]
async fn test_service_over_postgres() -> SettingsResult<()> {
    let storage = scratch_storage().await?;
    let service = SettingService::new(
        Arc::new(storage),
        Some(Arc::new(InMemoryCache::new())),
        test_codec(),
        CacheSettings::default(),
    );

    service
        .set("retry_count", 3, SettingType::Integer, DEFAULT_GROUP)
        .await?;
    assert_eq!(service.get("retry_count", 0).await?, SettingValue::from(3));

    service
        .set("api.key", "sk-123", SettingType::Encrypted, DEFAULT_GROUP)
        .await?;
    assert_eq!(service.get("api.key", "").await?, SettingValue::from("sk-123"));

    service.set_locked("retry_count", true).await?;
    let result = service.delete("retry_count").await;
    assert_locked(&result, "retry_count");
    Ok(())
}
