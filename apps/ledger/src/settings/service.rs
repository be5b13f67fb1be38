use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::audit::{AuditAction, AuditRecord, AuditStore};
use crate::settings::store::{SettingsStore, SettingsStoreError};
use crate::settings::types::{EffectiveConfig, SettingKey, SettingRecord, SettingView};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown setting key: {0}")]
    UnknownKey(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SettingsError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownKey(_) => "unknown_key",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<SettingsStoreError> for SettingsError {
    fn from(error: SettingsStoreError) -> Self {
        Self::Internal(error.to_string())
    }
}

/// Settings administration and effective-config resolution. The engine only
/// ever sees the resolved `EffectiveConfig`; writes go through `put`, which
/// enforces the rate/cap invariant before anything is stored.
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    audit: Arc<dyn AuditStore>,
    defaults: EffectiveConfig,
}

impl SettingsService {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        audit: Arc<dyn AuditStore>,
        defaults: EffectiveConfig,
    ) -> Self {
        Self {
            store,
            audit,
            defaults,
        }
    }

    /// Stored overrides merged over the deployment defaults.
    pub async fn effective(&self) -> Result<EffectiveConfig, SettingsError> {
        let mut config = self.defaults.clone();
        for record in self.store.list().await? {
            config.set(record.key, record.value);
        }
        Ok(config)
    }

    /// Admin listing: every known key with its effective value, default, and
    /// override provenance.
    pub async fn describe(&self) -> Result<Vec<SettingView>, SettingsError> {
        let overrides = self.store.list().await?;
        Ok(SettingKey::ALL
            .iter()
            .map(|key| {
                let stored = overrides.iter().find(|record| record.key == *key);
                SettingView {
                    key: *key,
                    value: stored.map_or(self.defaults.get(*key), |record| record.value),
                    default: self.defaults.get(*key),
                    description: stored.map(|record| record.description.clone()).unwrap_or_default(),
                    updated_by: stored.map(|record| record.updated_by.clone()),
                    updated_at: stored.map(|record| record.updated_at),
                }
            })
            .collect())
    }

    pub async fn put_raw(
        &self,
        key: &str,
        value: i64,
        description: &str,
        actor_id: &str,
    ) -> Result<SettingRecord, SettingsError> {
        let key = SettingKey::parse(key).ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
        self.put(key, value, description, actor_id).await
    }

    pub async fn put(
        &self,
        key: SettingKey,
        value: i64,
        description: &str,
        actor_id: &str,
    ) -> Result<SettingRecord, SettingsError> {
        if value < 0 {
            return Err(SettingsError::Configuration(format!(
                "{} must be non-negative",
                key.as_str()
            )));
        }

        let effective = self.effective().await?;
        if let Some(cap_key) = key.cap_key() {
            let cap = effective.get(cap_key);
            if value > cap {
                return Err(SettingsError::Configuration(format!(
                    "{} ({value}) cannot exceed {} ({cap})",
                    key.as_str(),
                    cap_key.as_str()
                )));
            }
        }
        if let Some(rate_key) = key.rate_key() {
            let rate = effective.get(rate_key);
            if value < rate {
                return Err(SettingsError::Configuration(format!(
                    "{} ({value}) cannot drop below {} ({rate})",
                    key.as_str(),
                    rate_key.as_str()
                )));
            }
        }

        let old_value = effective.get(key);
        let record = self
            .store
            .upsert(SettingRecord {
                key,
                value,
                description: description.to_string(),
                updated_by: actor_id.to_string(),
                updated_at: Utc::now(),
            })
            .await?;

        self.audit
            .append(AuditRecord::new(
                actor_id,
                AuditAction::SettingChanged,
                "setting",
                key.as_str(),
                json!({ "key": key.as_str(), "old_value": old_value, "new_value": value }),
            ))
            .await
            .map_err(|error| SettingsError::Internal(error.to_string()))?;

        info!(key = key.as_str(), old_value, new_value = value, "setting changed");
        Ok(record)
    }
}
