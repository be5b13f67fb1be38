use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::audit::{AuditAction, AuditRecord, AuditStore};
use crate::ledger::store::{LedgerStore, LedgerStoreError};
use crate::ledger::types::{ApproverRole, LedgerEntryRow};
use crate::performance::store::PerformanceStore;

#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already reversed")]
    AlreadyReversed,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApprovalError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyReversed => "already_reversed",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidState(_) => "invalid_state",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<LedgerStoreError> for ApprovalError {
    fn from(error: LedgerStoreError) -> Self {
        match error {
            LedgerStoreError::NotFound(id) => Self::NotFound(id),
            LedgerStoreError::Terminal(_) => Self::AlreadyReversed,
            LedgerStoreError::OrderingViolation(message) => Self::Forbidden(message),
            LedgerStoreError::InvalidState(message) => Self::InvalidState(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Approval state machine over existing ledger entries. Owns the approval
/// slots and the `Pending -> Approved -> Paid` progression; entry creation
/// and reversal live in the engine.
pub struct ApprovalService {
    ledger: Arc<dyn LedgerStore>,
    performance: Arc<dyn PerformanceStore>,
    audit: Arc<dyn AuditStore>,
}

impl ApprovalService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        performance: Arc<dyn PerformanceStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            ledger,
            performance,
            audit,
        }
    }

    /// Sets one approval slot. CEO actors may only touch the CEO slot, and
    /// the CEO slot can never be set before the admin slot (enforced
    /// atomically at the store). Re-approving an already-set slot is a no-op
    /// in effect, but every call still leaves an audit record.
    pub async fn approve(
        &self,
        entry_id: &str,
        slot: ApproverRole,
        actor_id: &str,
        actor_role: ApproverRole,
    ) -> Result<LedgerEntryRow, ApprovalError> {
        if actor_role == ApproverRole::Ceo && slot == ApproverRole::Admin {
            return Err(ApprovalError::Forbidden(
                "ceo actors cannot set the admin approval slot".to_string(),
            ));
        }

        let entry = self
            .ledger
            .approve_slot(entry_id, slot, actor_id, Utc::now())
            .await?;

        let action = match slot {
            ApproverRole::Admin => AuditAction::IncentiveAdminApproved,
            ApproverRole::Ceo => AuditAction::IncentiveCeoApproved,
        };
        self.audit_write(AuditRecord::new(
            actor_id,
            action,
            "ledger_entry",
            entry.entry_id.as_str(),
            json!({
                "slot": slot.as_str(),
                "amount": entry.amount,
                "status": entry.status.as_str(),
            }),
        ))
        .await?;

        info!(
            entry_id = %entry.entry_id,
            slot = slot.as_str(),
            status = entry.status.as_str(),
            "approval slot set"
        );
        Ok(entry)
    }

    /// Clears one approval slot. CEO actors may not revoke the admin slot.
    /// Clearing the admin slot cascades to the CEO slot so the ordering
    /// invariant holds at all times; status reverts to `Pending`.
    pub async fn revoke(
        &self,
        entry_id: &str,
        slot: ApproverRole,
        actor_id: &str,
        actor_role: ApproverRole,
    ) -> Result<LedgerEntryRow, ApprovalError> {
        if actor_role == ApproverRole::Ceo && slot == ApproverRole::Admin {
            return Err(ApprovalError::Forbidden(
                "ceo actors cannot revoke the admin approval slot".to_string(),
            ));
        }

        let entry = self.ledger.revoke_slot(entry_id, slot, Utc::now()).await?;

        self.audit_write(AuditRecord::new(
            actor_id,
            AuditAction::ApprovalRevoked,
            "ledger_entry",
            entry.entry_id.as_str(),
            json!({ "slot": slot.as_str(), "status": entry.status.as_str() }),
        ))
        .await?;

        info!(entry_id = %entry.entry_id, slot = slot.as_str(), "approval slot revoked");
        Ok(entry)
    }

    /// Advances an approved entry to `Paid` and rolls its amount into the
    /// beneficiary's running earnings for the period.
    pub async fn mark_paid(
        &self,
        entry_id: &str,
        actor_id: &str,
    ) -> Result<LedgerEntryRow, ApprovalError> {
        let now = Utc::now();
        let entry = self.ledger.mark_paid(entry_id, now).await?;

        self.performance
            .add_totals(
                entry.beneficiary_id.as_str(),
                entry.period.as_str(),
                0,
                entry.amount,
                now,
            )
            .await
            .map_err(|error| ApprovalError::Internal(error.to_string()))?;

        self.audit_write(AuditRecord::new(
            actor_id,
            AuditAction::IncentivePaid,
            "ledger_entry",
            entry.entry_id.as_str(),
            json!({ "amount": entry.amount, "period": entry.period }),
        ))
        .await?;

        info!(entry_id = %entry.entry_id, amount = entry.amount, "incentive marked paid");
        Ok(entry)
    }

    async fn audit_write(&self, record: AuditRecord) -> Result<(), ApprovalError> {
        self.audit
            .append(record)
            .await
            .map_err(|error| ApprovalError::Internal(error.to_string()))
    }
}
