use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::db::LedgerDb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    IncentiveCreated,
    MilestoneBonusAwarded,
    IncentiveAdminApproved,
    IncentiveCeoApproved,
    ApprovalRevoked,
    IncentivePaid,
    IncentiveReversed,
    SettingChanged,
    IncentivesSynced,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IncentiveCreated => "incentive_created",
            Self::MilestoneBonusAwarded => "milestone_bonus_awarded",
            Self::IncentiveAdminApproved => "incentive_admin_approved",
            Self::IncentiveCeoApproved => "incentive_ceo_approved",
            Self::ApprovalRevoked => "approval_revoked",
            Self::IncentivePaid => "incentive_paid",
            Self::IncentiveReversed => "incentive_reversed",
            Self::SettingChanged => "setting_changed",
            Self::IncentivesSynced => "incentives_synced",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "incentive_created" => Some(Self::IncentiveCreated),
            "milestone_bonus_awarded" => Some(Self::MilestoneBonusAwarded),
            "incentive_admin_approved" => Some(Self::IncentiveAdminApproved),
            "incentive_ceo_approved" => Some(Self::IncentiveCeoApproved),
            "approval_revoked" => Some(Self::ApprovalRevoked),
            "incentive_paid" => Some(Self::IncentivePaid),
            "incentive_reversed" => Some(Self::IncentiveReversed),
            "setting_changed" => Some(Self::SettingChanged),
            "incentives_synced" => Some(Self::IncentivesSynced),
            _ => None,
        }
    }
}

/// Append-only record of a state-mutating operation. Out-of-scope surfaces
/// read these; only the engine and its sibling services write them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: String,
    pub actor_id: String,
    pub action: AuditAction,
    pub entity_kind: String,
    pub entity_id: String,
    pub details: Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        actor_id: &str,
        action: AuditAction,
        entity_kind: &str,
        entity_id: &str,
        details: Value,
    ) -> Self {
        Self {
            audit_id: format!("aud_{}", uuid::Uuid::new_v4().simple()),
            actor_id: actor_id.to_string(),
            action,
            entity_kind: entity_kind.to_string(),
            entity_id: entity_id.to_string(),
            details,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditStoreError {
    #[error("db error: {0}")]
    Db(String),
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditStoreError>;

    async fn list_recent(
        &self,
        action: Option<AuditAction>,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, AuditStoreError>;
}

pub fn memory() -> Arc<dyn AuditStore> {
    Arc::new(MemoryAuditStore::default())
}

pub fn postgres(db: Arc<LedgerDb>) -> Arc<dyn AuditStore> {
    Arc::new(PostgresAuditStore { db })
}

#[derive(Default)]
struct MemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditStoreError> {
        let mut records = self.records.lock().await;
        records.push(record);
        Ok(())
    }

    async fn list_recent(
        &self,
        action: Option<AuditAction>,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, AuditStoreError> {
        let records = self.records.lock().await;
        let mut out = records
            .iter()
            .filter(|record| action.is_none_or(|wanted| record.action == wanted))
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by(|left, right| right.recorded_at.cmp(&left.recorded_at));
        out.truncate(limit.max(1));
        Ok(out)
    }
}

struct PostgresAuditStore {
    db: Arc<LedgerDb>,
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        client
            .execute(
                r#"
                INSERT INTO ledger.audit_records (
                    audit_id, actor_id, action, entity_kind, entity_id, details, recorded_at
                ) VALUES ($1,$2,$3,$4,$5,$6,$7)
                "#,
                &[
                    &record.audit_id,
                    &record.actor_id,
                    &record.action.as_str(),
                    &record.entity_kind,
                    &record.entity_id,
                    &record.details,
                    &record.recorded_at,
                ],
            )
            .await
            .map_err(|error| AuditStoreError::Db(error.to_string()))?;
        Ok(())
    }

    async fn list_recent(
        &self,
        action: Option<AuditAction>,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, AuditStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        let limit = i64::try_from(limit.max(1)).unwrap_or(i64::MAX);
        let rows = match action {
            Some(wanted) => {
                client
                    .query(
                        r#"
                        SELECT audit_id, actor_id, action, entity_kind, entity_id, details, recorded_at
                          FROM ledger.audit_records
                         WHERE action = $1
                         ORDER BY recorded_at DESC
                         LIMIT $2
                        "#,
                        &[&wanted.as_str(), &limit],
                    )
                    .await
            }
            None => {
                client
                    .query(
                        r#"
                        SELECT audit_id, actor_id, action, entity_kind, entity_id, details, recorded_at
                          FROM ledger.audit_records
                         ORDER BY recorded_at DESC
                         LIMIT $1
                        "#,
                        &[&limit],
                    )
                    .await
            }
        }
        .map_err(|error| AuditStoreError::Db(error.to_string()))?;

        rows.iter()
            .map(map_audit_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(AuditStoreError::Db)
    }
}

fn map_audit_row(row: &tokio_postgres::Row) -> Result<AuditRecord, String> {
    let action_raw: String = row.try_get("action").map_err(|e| e.to_string())?;
    let action = AuditAction::parse(action_raw.as_str())
        .ok_or_else(|| format!("unknown audit action: {action_raw}"))?;
    Ok(AuditRecord {
        audit_id: row.try_get("audit_id").map_err(|e| e.to_string())?,
        actor_id: row.try_get("actor_id").map_err(|e| e.to_string())?,
        action,
        entity_kind: row.try_get("entity_kind").map_err(|e| e.to_string())?,
        entity_id: row.try_get("entity_id").map_err(|e| e.to_string())?,
        details: row.try_get("details").map_err(|e| e.to_string())?,
        recorded_at: row.try_get("recorded_at").map_err(|e| e.to_string())?,
    })
}
