use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::audit::{AuditAction, AuditRecord, AuditStore};
use crate::engine::service::{DerivationOutcome, IncentiveEngine};
use crate::ledger::types::IncentiveType;
use crate::roster::{IncentiveRole, Roster, RosterMember};
use crate::settings::service::SettingsService;
use crate::settings::types::EffectiveConfig;
use crate::source::{LeadSource, SourceRecord};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Optional caller time-box. Once past it the job stops cleanly after
    /// the current record; already-committed entries stay in place and a
    /// later run picks up the rest (safe by idempotence).
    pub deadline: Option<DateTime<Utc>>,
}

impl ReconcileWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            deadline: None,
        }
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Utc::now() >= deadline)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub created: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
    pub halted: bool,
    pub completed_at: DateTime<Utc>,
}

/// On-demand reconciliation over the external lead source. Repeated runs are
/// safe: derivation is idempotent, duplicates count as skipped, and a failure
/// on one record never aborts the batch.
pub struct SyncService {
    engine: Arc<IncentiveEngine>,
    settings: Arc<SettingsService>,
    source: Arc<dyn LeadSource>,
    roster: Roster,
    audit: Arc<dyn AuditStore>,
}

impl SyncService {
    pub fn new(
        engine: Arc<IncentiveEngine>,
        settings: Arc<SettingsService>,
        source: Arc<dyn LeadSource>,
        roster: Roster,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            engine,
            settings,
            source,
            roster,
            audit,
        }
    }

    pub async fn reconcile(
        &self,
        window: ReconcileWindow,
        actor_id: &str,
    ) -> Result<ReconcileSummary, SyncError> {
        if self.roster.is_empty() {
            warn!("reconciling with an empty eligibility roster; nothing will derive");
        }
        let config = self
            .settings
            .effective()
            .await
            .map_err(|error| SyncError::Internal(error.to_string()))?;

        let mut summary = ReconcileSummary {
            created: 0,
            skipped: 0,
            errors: Vec::new(),
            halted: false,
            completed_at: Utc::now(),
        };

        // Closure incentives for every PO landed in the window.
        let po_records = self
            .source
            .list_po_between(window.start, window.end)
            .await
            .map_err(|error| SyncError::Internal(error.to_string()))?;
        for record in &po_records {
            if window.expired() {
                summary.halted = true;
                break;
            }
            let Some(member) = self.roster.member_by_name(record.closure_owner()) else {
                continue;
            };
            if member.role != IncentiveRole::Closer {
                continue;
            }
            self.derive_into(record, IncentiveType::Closure, member, &config, actor_id, &mut summary)
                .await;
        }

        // SQL incentives for prospectors, plus the conversion bonus once the
        // same record carries a PO date.
        if !summary.halted {
            let sql_records = self
                .source
                .list_sql_between(window.start, window.end)
                .await
                .map_err(|error| SyncError::Internal(error.to_string()))?;
            for record in &sql_records {
                if window.expired() {
                    summary.halted = true;
                    break;
                }
                let Some(member) = self.roster.member_by_name(record.lead_owner.as_str()) else {
                    continue;
                };
                if member.role != IncentiveRole::Prospector {
                    continue;
                }
                self.derive_into(record, IncentiveType::Sql, member, &config, actor_id, &mut summary)
                    .await;
                if record.po_date.is_some() {
                    self.derive_into(
                        record,
                        IncentiveType::PoConversion,
                        member,
                        &config,
                        actor_id,
                        &mut summary,
                    )
                    .await;
                }
            }
        }

        summary.completed_at = Utc::now();
        self.audit
            .append(AuditRecord::new(
                actor_id,
                AuditAction::IncentivesSynced,
                "ledger",
                "reconcile",
                json!({
                    "created": summary.created,
                    "skipped": summary.skipped,
                    "errors": summary.errors,
                    "halted": summary.halted,
                    "window_start": window.start,
                    "window_end": window.end,
                }),
            ))
            .await
            .map_err(|error| SyncError::Internal(error.to_string()))?;

        info!(
            created = summary.created,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            halted = summary.halted,
            "reconciliation finished"
        );
        Ok(summary)
    }

    async fn derive_into(
        &self,
        record: &SourceRecord,
        incentive_type: IncentiveType,
        member: &RosterMember,
        config: &EffectiveConfig,
        actor_id: &str,
        summary: &mut ReconcileSummary,
    ) {
        match self
            .engine
            .derive_entry(record, incentive_type, member, config, actor_id)
            .await
        {
            Ok(DerivationOutcome::Created(_)) => summary.created += 1,
            Ok(DerivationOutcome::AlreadyExists) => summary.skipped += 1,
            Err(error) => {
                warn!(
                    record_id = %record.record_id,
                    incentive_type = incentive_type.as_str(),
                    reason = %error,
                    "derivation failed during reconciliation"
                );
                summary
                    .errors
                    .push(format!("{}: {error}", record.record_id));
            }
        }
    }
}
