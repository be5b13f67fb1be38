use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::LedgerDb;
use crate::settings::types::{SettingKey, SettingRecord};

#[derive(Debug, thiserror::Error)]
pub enum SettingsStoreError {
    #[error("db error: {0}")]
    Db(String),
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: SettingKey) -> Result<Option<SettingRecord>, SettingsStoreError>;

    async fn list(&self) -> Result<Vec<SettingRecord>, SettingsStoreError>;

    async fn upsert(&self, record: SettingRecord) -> Result<SettingRecord, SettingsStoreError>;
}

pub fn memory() -> Arc<dyn SettingsStore> {
    Arc::new(MemorySettingsStore::default())
}

pub fn postgres(db: Arc<LedgerDb>) -> Arc<dyn SettingsStore> {
    Arc::new(PostgresSettingsStore { db })
}

#[derive(Default)]
struct MemorySettingsStore {
    overrides: Mutex<HashMap<SettingKey, SettingRecord>>,
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: SettingKey) -> Result<Option<SettingRecord>, SettingsStoreError> {
        let overrides = self.overrides.lock().await;
        Ok(overrides.get(&key).cloned())
    }

    async fn list(&self) -> Result<Vec<SettingRecord>, SettingsStoreError> {
        let overrides = self.overrides.lock().await;
        let mut records = overrides.values().cloned().collect::<Vec<_>>();
        records.sort_by_key(|record| record.key.as_str());
        Ok(records)
    }

    async fn upsert(&self, record: SettingRecord) -> Result<SettingRecord, SettingsStoreError> {
        let mut overrides = self.overrides.lock().await;
        overrides.insert(record.key, record.clone());
        Ok(record)
    }
}

struct PostgresSettingsStore {
    db: Arc<LedgerDb>,
}

#[async_trait]
impl SettingsStore for PostgresSettingsStore {
    async fn get(&self, key: SettingKey) -> Result<Option<SettingRecord>, SettingsStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        let row = client
            .query_opt(
                "SELECT key, value, description, updated_by, updated_at \
                   FROM ledger.settings_overrides WHERE key = $1",
                &[&key.as_str()],
            )
            .await
            .map_err(|error| SettingsStoreError::Db(error.to_string()))?;
        row.as_ref()
            .map(map_setting_row)
            .transpose()
            .map_err(SettingsStoreError::Db)
    }

    async fn list(&self) -> Result<Vec<SettingRecord>, SettingsStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        let rows = client
            .query(
                "SELECT key, value, description, updated_by, updated_at \
                   FROM ledger.settings_overrides ORDER BY key",
                &[],
            )
            .await
            .map_err(|error| SettingsStoreError::Db(error.to_string()))?;
        rows.iter()
            .map(map_setting_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SettingsStoreError::Db)
    }

    async fn upsert(&self, record: SettingRecord) -> Result<SettingRecord, SettingsStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        client
            .execute(
                "INSERT INTO ledger.settings_overrides (key, value, description, updated_by, updated_at) \
                 VALUES ($1,$2,$3,$4,$5) \
                 ON CONFLICT (key) DO UPDATE \
                    SET value = $2, description = $3, updated_by = $4, updated_at = $5",
                &[
                    &record.key.as_str(),
                    &record.value,
                    &record.description,
                    &record.updated_by,
                    &record.updated_at,
                ],
            )
            .await
            .map_err(|error| SettingsStoreError::Db(error.to_string()))?;
        Ok(record)
    }
}

fn map_setting_row(row: &tokio_postgres::Row) -> Result<SettingRecord, String> {
    let key_raw: String = row.try_get("key").map_err(|e| e.to_string())?;
    let key = SettingKey::parse(key_raw.as_str())
        .ok_or_else(|| format!("unknown setting key: {key_raw}"))?;
    Ok(SettingRecord {
        key,
        value: row.try_get("value").map_err(|e| e.to_string())?,
        description: row.try_get("description").map_err(|e| e.to_string())?,
        updated_by: row.try_get("updated_by").map_err(|e| e.to_string())?,
        updated_at: row.try_get("updated_at").map_err(|e| e.to_string())?,
    })
}
