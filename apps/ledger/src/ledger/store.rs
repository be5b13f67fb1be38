use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;

use crate::db::LedgerDb;
use crate::ledger::types::{
    ApprovalWorkflow, ApproverRole, EntryStatus, IncentiveType, LedgerEntryRow, LedgerFilter,
};

#[derive(Debug, thiserror::Error)]
pub enum LedgerStoreError {
    #[error("duplicate entry: {0}")]
    Duplicate(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("entry is reversed: {0}")]
    Terminal(String),
    #[error("approval ordering violation: {0}")]
    OrderingViolation(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("db error: {0}")]
    Db(String),
}

/// Storage contract for ledger entries. Every transition is a single atomic
/// conditional update so concurrent approve/revoke/reverse calls on one entry
/// serialize at the storage layer. The `(source_record_id, incentive_type,
/// beneficiary_id)` uniqueness among non-reversed entries is enforced here,
/// not only by the engine's existence check.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_entry(&self, entry: LedgerEntryRow)
        -> Result<LedgerEntryRow, LedgerStoreError>;

    async fn get_entry(&self, entry_id: &str)
        -> Result<Option<LedgerEntryRow>, LedgerStoreError>;

    async fn find_active(
        &self,
        source_record_id: &str,
        incentive_type: IncentiveType,
        beneficiary_id: &str,
    ) -> Result<Option<LedgerEntryRow>, LedgerStoreError>;

    async fn list_entries(
        &self,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntryRow>, LedgerStoreError>;

    async fn approve_slot(
        &self,
        entry_id: &str,
        role: ApproverRole,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError>;

    async fn revoke_slot(
        &self,
        entry_id: &str,
        role: ApproverRole,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError>;

    async fn mark_paid(
        &self,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError>;

    async fn reverse(
        &self,
        entry_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError>;
}

pub fn memory() -> Arc<dyn LedgerStore> {
    Arc::new(MemoryLedgerStore::default())
}

pub fn postgres(db: Arc<LedgerDb>) -> Arc<dyn LedgerStore> {
    Arc::new(PostgresLedgerStore { db })
}

// Transition rules shared by the memory backend and the postgres failure
// classifier. The postgres backend encodes the same conditions in its
// conditional UPDATE statements.

fn apply_approval(
    entry: &mut LedgerEntryRow,
    role: ApproverRole,
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<(), LedgerStoreError> {
    if entry.status == EntryStatus::Reversed {
        return Err(LedgerStoreError::Terminal(entry.entry_id.clone()));
    }
    if entry.workflow != ApprovalWorkflow::DualApprover {
        return Err(LedgerStoreError::InvalidState(
            "single-approver entries do not take slot approvals".to_string(),
        ));
    }
    match role {
        ApproverRole::Admin => {
            if !entry.admin_approved {
                entry.admin_approved = true;
                entry.admin_approved_by = Some(actor_id.to_string());
                entry.admin_approved_at = Some(now);
            }
        }
        ApproverRole::Ceo => {
            if !entry.admin_approved {
                return Err(LedgerStoreError::OrderingViolation(
                    "ceo approval requires admin approval first".to_string(),
                ));
            }
            if !entry.ceo_approved {
                entry.ceo_approved = true;
                entry.ceo_approved_by = Some(actor_id.to_string());
                entry.ceo_approved_at = Some(now);
            }
        }
    }
    if entry.status == EntryStatus::Pending && entry.admin_approved && entry.ceo_approved {
        entry.status = EntryStatus::Approved;
    }
    Ok(())
}

fn apply_revocation(
    entry: &mut LedgerEntryRow,
    role: ApproverRole,
) -> Result<(), LedgerStoreError> {
    if entry.status == EntryStatus::Reversed {
        return Err(LedgerStoreError::Terminal(entry.entry_id.clone()));
    }
    if entry.workflow != ApprovalWorkflow::DualApprover {
        return Err(LedgerStoreError::InvalidState(
            "single-approver entries do not take slot revocations".to_string(),
        ));
    }
    if entry.status == EntryStatus::Paid {
        return Err(LedgerStoreError::InvalidState(
            "paid entries cannot be revoked".to_string(),
        ));
    }
    match role {
        ApproverRole::Admin => {
            // Clearing the admin slot also clears the CEO slot so
            // ceo_approved implies admin_approved at all times.
            entry.admin_approved = false;
            entry.admin_approved_by = None;
            entry.admin_approved_at = None;
            entry.ceo_approved = false;
            entry.ceo_approved_by = None;
            entry.ceo_approved_at = None;
        }
        ApproverRole::Ceo => {
            entry.ceo_approved = false;
            entry.ceo_approved_by = None;
            entry.ceo_approved_at = None;
        }
    }
    entry.status = EntryStatus::Pending;
    Ok(())
}

fn apply_mark_paid(entry: &mut LedgerEntryRow, now: DateTime<Utc>) -> Result<(), LedgerStoreError> {
    if entry.status == EntryStatus::Reversed {
        return Err(LedgerStoreError::Terminal(entry.entry_id.clone()));
    }
    if entry.status != EntryStatus::Approved {
        return Err(LedgerStoreError::InvalidState(format!(
            "cannot pay entry with status {}",
            entry.status.as_str()
        )));
    }
    entry.status = EntryStatus::Paid;
    entry.paid_at = Some(now);
    Ok(())
}

fn apply_reverse(
    entry: &mut LedgerEntryRow,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<(), LedgerStoreError> {
    if entry.status == EntryStatus::Reversed {
        return Err(LedgerStoreError::Terminal(entry.entry_id.clone()));
    }
    entry.status = EntryStatus::Reversed;
    entry.reversed_at = Some(now);
    entry.reversal_reason = Some(reason.to_string());
    Ok(())
}

#[derive(Default)]
struct MemoryLedgerStore {
    inner: Mutex<MemoryLedgerStoreInner>,
}

#[derive(Default)]
struct MemoryLedgerStoreInner {
    by_id: HashMap<String, LedgerEntryRow>,
    active_by_triple: HashMap<(String, IncentiveType, String), String>,
}

impl MemoryLedgerStoreInner {
    fn triple_of(entry: &LedgerEntryRow) -> (String, IncentiveType, String) {
        (
            entry.source_record_id.clone(),
            entry.incentive_type,
            entry.beneficiary_id.clone(),
        )
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_entry(
        &self,
        entry: LedgerEntryRow,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        let mut inner = self.inner.lock().await;
        let triple = MemoryLedgerStoreInner::triple_of(&entry);
        if inner.active_by_triple.contains_key(&triple) {
            return Err(LedgerStoreError::Duplicate(format!(
                "{}/{}/{}",
                entry.source_record_id,
                entry.incentive_type.as_str(),
                entry.beneficiary_id
            )));
        }
        inner
            .active_by_triple
            .insert(triple, entry.entry_id.clone());
        inner.by_id.insert(entry.entry_id.clone(), entry.clone());
        Ok(entry)
    }

    async fn get_entry(
        &self,
        entry_id: &str,
    ) -> Result<Option<LedgerEntryRow>, LedgerStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.by_id.get(entry_id).cloned())
    }

    async fn find_active(
        &self,
        source_record_id: &str,
        incentive_type: IncentiveType,
        beneficiary_id: &str,
    ) -> Result<Option<LedgerEntryRow>, LedgerStoreError> {
        let inner = self.inner.lock().await;
        let key = (
            source_record_id.to_string(),
            incentive_type,
            beneficiary_id.to_string(),
        );
        Ok(inner
            .active_by_triple
            .get(&key)
            .and_then(|entry_id| inner.by_id.get(entry_id))
            .cloned())
    }

    async fn list_entries(
        &self,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntryRow>, LedgerStoreError> {
        let inner = self.inner.lock().await;
        let mut entries = inner
            .by_id
            .values()
            .filter(|entry| {
                filter
                    .beneficiary_id
                    .as_ref()
                    .is_none_or(|wanted| &entry.beneficiary_id == wanted)
                    && filter
                        .period
                        .as_ref()
                        .is_none_or(|wanted| &entry.period == wanted)
                    && filter.status.is_none_or(|wanted| entry.status == wanted)
                    && filter
                        .incentive_type
                        .is_none_or(|wanted| entry.incentive_type == wanted)
            })
            .cloned()
            .collect::<Vec<_>>();
        entries.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(entries)
    }

    async fn approve_slot(
        &self,
        entry_id: &str,
        role: ApproverRole,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .by_id
            .get_mut(entry_id)
            .ok_or_else(|| LedgerStoreError::NotFound(entry_id.to_string()))?;
        apply_approval(entry, role, actor_id, now)?;
        Ok(entry.clone())
    }

    async fn revoke_slot(
        &self,
        entry_id: &str,
        role: ApproverRole,
        _now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .by_id
            .get_mut(entry_id)
            .ok_or_else(|| LedgerStoreError::NotFound(entry_id.to_string()))?;
        apply_revocation(entry, role)?;
        Ok(entry.clone())
    }

    async fn mark_paid(
        &self,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .by_id
            .get_mut(entry_id)
            .ok_or_else(|| LedgerStoreError::NotFound(entry_id.to_string()))?;
        apply_mark_paid(entry, now)?;
        Ok(entry.clone())
    }

    async fn reverse(
        &self,
        entry_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .by_id
            .get(entry_id)
            .cloned()
            .ok_or_else(|| LedgerStoreError::NotFound(entry_id.to_string()))?;
        let mut updated = entry;
        apply_reverse(&mut updated, reason, now)?;
        let triple = MemoryLedgerStoreInner::triple_of(&updated);
        inner.active_by_triple.remove(&triple);
        inner
            .by_id
            .insert(updated.entry_id.clone(), updated.clone());
        Ok(updated)
    }
}

struct PostgresLedgerStore {
    db: Arc<LedgerDb>,
}

const ENTRY_COLUMNS: &str = "entry_id, beneficiary_id, beneficiary_name, source_record_id, \
     client_company, incentive_type, amount, period, description, workflow, \
     admin_approved, admin_approved_by, admin_approved_at, \
     ceo_approved, ceo_approved_by, ceo_approved_at, \
     status, paid_at, reversed_at, reversal_reason, created_at";

impl PostgresLedgerStore {
    /// Re-reads the entry after a conditional update matched no row and maps
    /// the current state to the error the transition rules would produce.
    async fn classify_failed_transition(
        &self,
        entry_id: &str,
        classify: impl FnOnce(&mut LedgerEntryRow) -> Result<(), LedgerStoreError>,
    ) -> LedgerStoreError {
        match self.get_entry(entry_id).await {
            Ok(Some(mut entry)) => match classify(&mut entry) {
                Err(error) => error,
                Ok(()) => LedgerStoreError::Db(
                    "transition conditions changed concurrently, retry".to_string(),
                ),
            },
            Ok(None) => LedgerStoreError::NotFound(entry_id.to_string()),
            Err(error) => error,
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn insert_entry(
        &self,
        entry: LedgerEntryRow,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        let result = client
            .execute(
                r#"
                INSERT INTO ledger.incentive_entries (
                    entry_id, beneficiary_id, beneficiary_name, source_record_id,
                    client_company, incentive_type, amount, period, description, workflow,
                    admin_approved, admin_approved_by, admin_approved_at,
                    ceo_approved, ceo_approved_by, ceo_approved_at,
                    status, paid_at, reversed_at, reversal_reason, created_at
                ) VALUES (
                    $1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21
                )
                "#,
                &[
                    &entry.entry_id,
                    &entry.beneficiary_id,
                    &entry.beneficiary_name,
                    &entry.source_record_id,
                    &entry.client_company,
                    &entry.incentive_type.as_str(),
                    &entry.amount,
                    &entry.period,
                    &entry.description,
                    &entry.workflow.as_str(),
                    &entry.admin_approved,
                    &entry.admin_approved_by,
                    &entry.admin_approved_at,
                    &entry.ceo_approved,
                    &entry.ceo_approved_by,
                    &entry.ceo_approved_at,
                    &entry.status.as_str(),
                    &entry.paid_at,
                    &entry.reversed_at,
                    &entry.reversal_reason,
                    &entry.created_at,
                ],
            )
            .await;

        if let Err(error) = result {
            if error.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                return Err(LedgerStoreError::Duplicate(format!(
                    "{}/{}/{}",
                    entry.source_record_id,
                    entry.incentive_type.as_str(),
                    entry.beneficiary_id
                )));
            }
            return Err(LedgerStoreError::Db(error.to_string()));
        }
        Ok(entry)
    }

    async fn get_entry(
        &self,
        entry_id: &str,
    ) -> Result<Option<LedgerEntryRow>, LedgerStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM ledger.incentive_entries WHERE entry_id = $1"
                ),
                &[&entry_id],
            )
            .await
            .map_err(|error| LedgerStoreError::Db(error.to_string()))?;
        row.as_ref()
            .map(map_entry_row)
            .transpose()
            .map_err(LedgerStoreError::Db)
    }

    async fn find_active(
        &self,
        source_record_id: &str,
        incentive_type: IncentiveType,
        beneficiary_id: &str,
    ) -> Result<Option<LedgerEntryRow>, LedgerStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM ledger.incentive_entries \
                     WHERE source_record_id = $1 AND incentive_type = $2 \
                       AND beneficiary_id = $3 AND status <> 'reversed'"
                ),
                &[&source_record_id, &incentive_type.as_str(), &beneficiary_id],
            )
            .await
            .map_err(|error| LedgerStoreError::Db(error.to_string()))?;
        row.as_ref()
            .map(map_entry_row)
            .transpose()
            .map_err(LedgerStoreError::Db)
    }

    async fn list_entries(
        &self,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntryRow>, LedgerStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        let status = filter.status.map(|value| value.as_str().to_string());
        let incentive_type = filter
            .incentive_type
            .map(|value| value.as_str().to_string());
        let rows = client
            .query(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM ledger.incentive_entries \
                     WHERE ($1::TEXT IS NULL OR beneficiary_id = $1) \
                       AND ($2::TEXT IS NULL OR period = $2) \
                       AND ($3::TEXT IS NULL OR status = $3) \
                       AND ($4::TEXT IS NULL OR incentive_type = $4) \
                     ORDER BY created_at DESC"
                ),
                &[
                    &filter.beneficiary_id,
                    &filter.period,
                    &status,
                    &incentive_type,
                ],
            )
            .await
            .map_err(|error| LedgerStoreError::Db(error.to_string()))?;
        rows.iter()
            .map(map_entry_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(LedgerStoreError::Db)
    }

    async fn approve_slot(
        &self,
        entry_id: &str,
        role: ApproverRole,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        let statement = match role {
            ApproverRole::Admin => format!(
                "UPDATE ledger.incentive_entries \
                    SET admin_approved_by = CASE WHEN admin_approved THEN admin_approved_by ELSE $2 END, \
                        admin_approved_at = CASE WHEN admin_approved THEN admin_approved_at ELSE $3 END, \
                        admin_approved = TRUE, \
                        status = CASE WHEN status = 'pending' AND ceo_approved THEN 'approved' ELSE status END \
                  WHERE entry_id = $1 AND status <> 'reversed' AND workflow = 'dual_approver' \
                 RETURNING {ENTRY_COLUMNS}"
            ),
            ApproverRole::Ceo => format!(
                "UPDATE ledger.incentive_entries \
                    SET ceo_approved_by = CASE WHEN ceo_approved THEN ceo_approved_by ELSE $2 END, \
                        ceo_approved_at = CASE WHEN ceo_approved THEN ceo_approved_at ELSE $3 END, \
                        ceo_approved = TRUE, \
                        status = CASE WHEN status = 'pending' AND admin_approved THEN 'approved' ELSE status END \
                  WHERE entry_id = $1 AND status <> 'reversed' AND workflow = 'dual_approver' \
                        AND admin_approved \
                 RETURNING {ENTRY_COLUMNS}"
            ),
        };

        let row = {
            let client = self.db.client();
            let client = client.lock().await;
            client
                .query_opt(&statement, &[&entry_id, &actor_id, &now])
                .await
                .map_err(|error| LedgerStoreError::Db(error.to_string()))?
        };

        match row {
            Some(row) => map_entry_row(&row).map_err(LedgerStoreError::Db),
            None => Err(self
                .classify_failed_transition(entry_id, |entry| {
                    apply_approval(entry, role, actor_id, now)
                })
                .await),
        }
    }

    async fn revoke_slot(
        &self,
        entry_id: &str,
        role: ApproverRole,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        let statement = match role {
            ApproverRole::Admin => format!(
                "UPDATE ledger.incentive_entries \
                    SET admin_approved = FALSE, admin_approved_by = NULL, admin_approved_at = NULL, \
                        ceo_approved = FALSE, ceo_approved_by = NULL, ceo_approved_at = NULL, \
                        status = 'pending' \
                  WHERE entry_id = $1 AND status IN ('pending','approved') \
                        AND workflow = 'dual_approver' \
                 RETURNING {ENTRY_COLUMNS}"
            ),
            ApproverRole::Ceo => format!(
                "UPDATE ledger.incentive_entries \
                    SET ceo_approved = FALSE, ceo_approved_by = NULL, ceo_approved_at = NULL, \
                        status = 'pending' \
                  WHERE entry_id = $1 AND status IN ('pending','approved') \
                        AND workflow = 'dual_approver' \
                 RETURNING {ENTRY_COLUMNS}"
            ),
        };

        let row = {
            let client = self.db.client();
            let client = client.lock().await;
            client
                .query_opt(&statement, &[&entry_id])
                .await
                .map_err(|error| LedgerStoreError::Db(error.to_string()))?
        };

        let _ = now;
        match row {
            Some(row) => map_entry_row(&row).map_err(LedgerStoreError::Db),
            None => Err(self
                .classify_failed_transition(entry_id, |entry| apply_revocation(entry, role))
                .await),
        }
    }

    async fn mark_paid(
        &self,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        let row = {
            let client = self.db.client();
            let client = client.lock().await;
            client
                .query_opt(
                    &format!(
                        "UPDATE ledger.incentive_entries \
                            SET status = 'paid', paid_at = $2 \
                          WHERE entry_id = $1 AND status = 'approved' \
                         RETURNING {ENTRY_COLUMNS}"
                    ),
                    &[&entry_id, &now],
                )
                .await
                .map_err(|error| LedgerStoreError::Db(error.to_string()))?
        };

        match row {
            Some(row) => map_entry_row(&row).map_err(LedgerStoreError::Db),
            None => Err(self
                .classify_failed_transition(entry_id, |entry| apply_mark_paid(entry, now))
                .await),
        }
    }

    async fn reverse(
        &self,
        entry_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        let row = {
            let client = self.db.client();
            let client = client.lock().await;
            client
                .query_opt(
                    &format!(
                        "UPDATE ledger.incentive_entries \
                            SET status = 'reversed', reversed_at = $2, reversal_reason = $3 \
                          WHERE entry_id = $1 AND status <> 'reversed' \
                         RETURNING {ENTRY_COLUMNS}"
                    ),
                    &[&entry_id, &now, &reason],
                )
                .await
                .map_err(|error| LedgerStoreError::Db(error.to_string()))?
        };

        match row {
            Some(row) => map_entry_row(&row).map_err(LedgerStoreError::Db),
            None => Err(self
                .classify_failed_transition(entry_id, |entry| apply_reverse(entry, reason, now))
                .await),
        }
    }
}

fn map_entry_row(row: &tokio_postgres::Row) -> Result<LedgerEntryRow, String> {
    let incentive_type_raw: String = row.try_get("incentive_type").map_err(|e| e.to_string())?;
    let incentive_type = IncentiveType::parse(incentive_type_raw.as_str())
        .ok_or_else(|| format!("unknown incentive type: {incentive_type_raw}"))?;
    let status_raw: String = row.try_get("status").map_err(|e| e.to_string())?;
    let status = EntryStatus::parse(status_raw.as_str())
        .ok_or_else(|| format!("unknown entry status: {status_raw}"))?;
    let workflow_raw: String = row.try_get("workflow").map_err(|e| e.to_string())?;
    let workflow = ApprovalWorkflow::parse(workflow_raw.as_str())
        .ok_or_else(|| format!("unknown approval workflow: {workflow_raw}"))?;

    Ok(LedgerEntryRow {
        entry_id: row.try_get("entry_id").map_err(|e| e.to_string())?,
        beneficiary_id: row.try_get("beneficiary_id").map_err(|e| e.to_string())?,
        beneficiary_name: row
            .try_get("beneficiary_name")
            .map_err(|e| e.to_string())?,
        source_record_id: row
            .try_get("source_record_id")
            .map_err(|e| e.to_string())?,
        client_company: row.try_get("client_company").map_err(|e| e.to_string())?,
        incentive_type,
        amount: row.try_get("amount").map_err(|e| e.to_string())?,
        period: row.try_get("period").map_err(|e| e.to_string())?,
        description: row.try_get("description").map_err(|e| e.to_string())?,
        workflow,
        admin_approved: row.try_get("admin_approved").map_err(|e| e.to_string())?,
        admin_approved_by: row
            .try_get("admin_approved_by")
            .map_err(|e| e.to_string())?,
        admin_approved_at: row
            .try_get("admin_approved_at")
            .map_err(|e| e.to_string())?,
        ceo_approved: row.try_get("ceo_approved").map_err(|e| e.to_string())?,
        ceo_approved_by: row.try_get("ceo_approved_by").map_err(|e| e.to_string())?,
        ceo_approved_at: row.try_get("ceo_approved_at").map_err(|e| e.to_string())?,
        status,
        paid_at: row.try_get("paid_at").map_err(|e| e.to_string())?,
        reversed_at: row.try_get("reversed_at").map_err(|e| e.to_string())?,
        reversal_reason: row.try_get("reversal_reason").map_err(|e| e.to_string())?,
        created_at: row.try_get("created_at").map_err(|e| e.to_string())?,
    })
}
