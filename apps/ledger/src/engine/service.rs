use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::audit::{AuditAction, AuditRecord, AuditStore};
use crate::ledger::store::{LedgerStore, LedgerStoreError};
use crate::ledger::types::{
    ApprovalWorkflow, EntryStatus, IncentiveType, LedgerEntryRow, period_for,
};
use crate::performance::store::PerformanceStore;
use crate::performance::types::{MilestoneKind, PerformanceCounterRow, QualifyingMetric};
use crate::roster::RosterMember;
use crate::settings::types::EffectiveConfig;
use crate::source::SourceRecord;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
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

impl EngineError {
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

/// Outcome of a derivation attempt. `AlreadyExists` is the idempotence
/// short-circuit, not a failure: callers report it as "skipped".
#[derive(Debug, Clone)]
pub enum DerivationOutcome {
    Created(LedgerEntryRow),
    AlreadyExists,
}

impl DerivationOutcome {
    pub fn created(&self) -> Option<&LedgerEntryRow> {
        match self {
            Self::Created(entry) => Some(entry),
            Self::AlreadyExists => None,
        }
    }
}

/// The incentive engine owns every ledger-entry creation and every
/// performance-counter mutation. Approval-state transitions live in the
/// approval service; everything else that writes goes through here.
pub struct IncentiveEngine {
    ledger: Arc<dyn LedgerStore>,
    performance: Arc<dyn PerformanceStore>,
    audit: Arc<dyn AuditStore>,
}

impl IncentiveEngine {
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

    pub fn ledger(&self) -> Arc<dyn LedgerStore> {
        self.ledger.clone()
    }

    pub fn performance(&self) -> Arc<dyn PerformanceStore> {
        self.performance.clone()
    }

    /// Derives one incentive entry from an external source record.
    ///
    /// Never produces two non-reversed entries for the same
    /// `(source_record_id, incentive_type, beneficiary_id)` triple: the
    /// existence check covers the common path and the store's uniqueness
    /// constraint closes the check-then-insert race, surfacing as
    /// `AlreadyExists` either way.
    pub async fn derive_entry(
        &self,
        record: &SourceRecord,
        incentive_type: IncentiveType,
        beneficiary: &RosterMember,
        config: &EffectiveConfig,
        actor_id: &str,
    ) -> Result<DerivationOutcome, EngineError> {
        if matches!(
            incentive_type,
            IncentiveType::BonusSqlMilestone | IncentiveType::BonusPoMilestone
        ) {
            return Err(EngineError::InvalidState(
                "milestone bonuses are derived from counters, not source records".to_string(),
            ));
        }
        if !beneficiary.role.allows(incentive_type) {
            return Err(EngineError::Forbidden(format!(
                "{} is not eligible for {} incentives",
                beneficiary.display_name,
                incentive_type.as_str()
            )));
        }

        let existing = self
            .ledger
            .find_active(
                record.record_id.as_str(),
                incentive_type,
                beneficiary.user_id.as_str(),
            )
            .await
            .map_err(|error| EngineError::Internal(error.to_string()))?;
        if existing.is_some() {
            return Ok(DerivationOutcome::AlreadyExists);
        }

        let now = Utc::now();
        let event_date = match incentive_type {
            IncentiveType::Sql => record.sql_date,
            IncentiveType::PoConversion | IncentiveType::Closure => record.po_date,
            IncentiveType::BonusSqlMilestone | IncentiveType::BonusPoMilestone => None,
        }
        .unwrap_or(now);
        let period = period_for(event_date);

        let amount = match incentive_type {
            IncentiveType::Sql => config.capped_sql_amount(),
            IncentiveType::Closure => config.capped_closure_amount(),
            IncentiveType::PoConversion => config.po_conversion_bonus,
            IncentiveType::BonusSqlMilestone => config.sql_milestone_bonus,
            IncentiveType::BonusPoMilestone => config.po_milestone_bonus,
        };

        let company = record.client_company.clone().unwrap_or_default();
        let description = match incentive_type {
            IncentiveType::Sql => format!("SQL incentive: {company} ({})", record.record_id),
            IncentiveType::PoConversion => {
                format!("PO conversion bonus: {company} ({})", record.record_id)
            }
            _ => format!("PO incentive: {company} ({})", record.record_id),
        };

        let entry = LedgerEntryRow {
            entry_id: format!("inc_{}", uuid::Uuid::new_v4().simple()),
            beneficiary_id: beneficiary.user_id.clone(),
            beneficiary_name: beneficiary.display_name.clone(),
            source_record_id: record.record_id.clone(),
            client_company: record.client_company.clone(),
            incentive_type,
            amount,
            period: period.clone(),
            description,
            workflow: incentive_type.workflow(),
            admin_approved: false,
            admin_approved_by: None,
            admin_approved_at: None,
            ceo_approved: false,
            ceo_approved_by: None,
            ceo_approved_at: None,
            status: EntryStatus::Pending,
            paid_at: None,
            reversed_at: None,
            reversal_reason: None,
            created_at: now,
        };

        let entry = match self.ledger.insert_entry(entry).await {
            Ok(entry) => entry,
            Err(LedgerStoreError::Duplicate(_)) => return Ok(DerivationOutcome::AlreadyExists),
            Err(error) => return Err(EngineError::Internal(error.to_string())),
        };

        self.audit_write(AuditRecord::new(
            actor_id,
            AuditAction::IncentiveCreated,
            "ledger_entry",
            entry.entry_id.as_str(),
            json!({
                "source_record_id": entry.source_record_id,
                "incentive_type": entry.incentive_type.as_str(),
                "beneficiary_id": entry.beneficiary_id,
                "amount": entry.amount,
                "period": entry.period,
            }),
        ))
        .await?;

        info!(
            entry_id = %entry.entry_id,
            incentive_type = entry.incentive_type.as_str(),
            beneficiary = %entry.beneficiary_name,
            amount = entry.amount,
            "incentive entry created"
        );

        if incentive_type == IncentiveType::Closure {
            self.performance
                .increment(
                    beneficiary.user_id.as_str(),
                    period.as_str(),
                    QualifyingMetric::Po,
                    now,
                )
                .await
                .map_err(|error| EngineError::Internal(error.to_string()))?;
            self.evaluate_milestones(beneficiary, period.as_str(), config, actor_id)
                .await?;
        }

        Ok(DerivationOutcome::Created(entry))
    }

    /// Records a qualifying event (deal closed, PO landed) against the
    /// monthly counter and immediately re-evaluates milestone thresholds.
    pub async fn record_qualifying_event(
        &self,
        beneficiary: &RosterMember,
        period: &str,
        metric: QualifyingMetric,
        config: &EffectiveConfig,
        actor_id: &str,
    ) -> Result<(PerformanceCounterRow, Vec<LedgerEntryRow>), EngineError> {
        let counter = self
            .performance
            .increment(beneficiary.user_id.as_str(), period, metric, Utc::now())
            .await
            .map_err(|error| EngineError::Internal(error.to_string()))?;
        let awarded = self
            .evaluate_milestones(beneficiary, period, config, actor_id)
            .await?;
        Ok((counter, awarded))
    }

    /// Awards milestone bonuses whose threshold the counter has crossed.
    /// The one-way counter flags are the sole idempotence gate: re-invocation
    /// with an unchanged counter is a no-op.
    pub async fn evaluate_milestones(
        &self,
        beneficiary: &RosterMember,
        period: &str,
        config: &EffectiveConfig,
        actor_id: &str,
    ) -> Result<Vec<LedgerEntryRow>, EngineError> {
        let Some(counter) = self
            .performance
            .get(beneficiary.user_id.as_str(), period)
            .await
            .map_err(|error| EngineError::Internal(error.to_string()))?
        else {
            return Ok(Vec::new());
        };

        let mut awarded = Vec::new();
        let milestones = [
            (
                MilestoneKind::Sql,
                counter.sql_closed_count,
                config.sql_milestone_threshold,
                config.sql_milestone_bonus,
                IncentiveType::BonusSqlMilestone,
            ),
            (
                MilestoneKind::Po,
                counter.po_count,
                config.po_milestone_threshold,
                config.po_milestone_bonus,
                IncentiveType::BonusPoMilestone,
            ),
        ];

        for (kind, count, threshold, bonus, incentive_type) in milestones {
            if count < threshold || counter.milestone_paid(kind) {
                continue;
            }
            if let Some(entry) = self
                .award_milestone(beneficiary, period, kind, count, bonus, incentive_type, actor_id)
                .await?
            {
                awarded.push(entry);
            }
        }
        Ok(awarded)
    }

    #[allow(clippy::too_many_arguments)]
    async fn award_milestone(
        &self,
        beneficiary: &RosterMember,
        period: &str,
        kind: MilestoneKind,
        count: i64,
        bonus: i64,
        incentive_type: IncentiveType,
        actor_id: &str,
    ) -> Result<Option<LedgerEntryRow>, EngineError> {
        let now = Utc::now();
        let claimed = self
            .performance
            .claim_milestone(beneficiary.user_id.as_str(), period, kind, now)
            .await
            .map_err(|error| EngineError::Internal(error.to_string()))?;
        if !claimed {
            return Ok(None);
        }

        // Synthetic per-period source identity, so a fresh period can pay again.
        let source_record_id = format!(
            "milestone-{}:{}:{}",
            kind.as_str(),
            beneficiary.user_id,
            period
        );
        let description = match kind {
            MilestoneKind::Sql => {
                format!("SQL milestone bonus: {count} closed in {period}")
            }
            MilestoneKind::Po => format!("PO milestone bonus: {count} POs in {period}"),
        };

        let entry = LedgerEntryRow {
            entry_id: format!("inc_{}", uuid::Uuid::new_v4().simple()),
            beneficiary_id: beneficiary.user_id.clone(),
            beneficiary_name: beneficiary.display_name.clone(),
            source_record_id,
            client_company: None,
            incentive_type,
            amount: bonus,
            period: period.to_string(),
            description,
            workflow: ApprovalWorkflow::SingleApprover,
            admin_approved: false,
            admin_approved_by: None,
            admin_approved_at: None,
            ceo_approved: false,
            ceo_approved_by: None,
            ceo_approved_at: None,
            status: EntryStatus::Approved,
            paid_at: None,
            reversed_at: None,
            reversal_reason: None,
            created_at: now,
        };

        let entry = match self.ledger.insert_entry(entry).await {
            Ok(entry) => entry,
            // Flag was claimed but the entry already exists: an earlier award
            // got as far as the insert. Nothing more to do.
            Err(LedgerStoreError::Duplicate(_)) => return Ok(None),
            Err(error) => return Err(EngineError::Internal(error.to_string())),
        };

        self.performance
            .add_totals(beneficiary.user_id.as_str(), period, bonus, 0, now)
            .await
            .map_err(|error| EngineError::Internal(error.to_string()))?;

        self.audit_write(AuditRecord::new(
            actor_id,
            AuditAction::MilestoneBonusAwarded,
            "performance_counter",
            format!("{}:{period}", beneficiary.user_id).as_str(),
            json!({
                "milestone": kind.as_str(),
                "count": count,
                "bonus": bonus,
                "entry_id": entry.entry_id,
            }),
        ))
        .await?;

        info!(
            beneficiary = %beneficiary.display_name,
            period,
            milestone = kind.as_str(),
            count,
            bonus,
            "milestone bonus awarded"
        );
        Ok(Some(entry))
    }

    /// Terminally invalidates an entry. Overrides approval state; the
    /// performance counters that may have gated a milestone are deliberately
    /// left untouched (historical counts are not retroactively corrected).
    pub async fn reverse_entry(
        &self,
        entry_id: &str,
        reason: &str,
        actor_id: &str,
    ) -> Result<LedgerEntryRow, EngineError> {
        let entry = match self.ledger.reverse(entry_id, reason, Utc::now()).await {
            Ok(entry) => entry,
            Err(LedgerStoreError::NotFound(id)) => return Err(EngineError::NotFound(id)),
            Err(LedgerStoreError::Terminal(_)) => return Err(EngineError::AlreadyReversed),
            Err(error) => return Err(EngineError::Internal(error.to_string())),
        };

        self.audit_write(AuditRecord::new(
            actor_id,
            AuditAction::IncentiveReversed,
            "ledger_entry",
            entry.entry_id.as_str(),
            json!({
                "reason": reason,
                "original_amount": entry.amount,
                "incentive_type": entry.incentive_type.as_str(),
            }),
        ))
        .await?;

        info!(entry_id = %entry.entry_id, reason, "incentive entry reversed");
        Ok(entry)
    }

    async fn audit_write(&self, record: AuditRecord) -> Result<(), EngineError> {
        self.audit
            .append(record)
            .await
            .map_err(|error| EngineError::Internal(error.to_string()))
    }
}
