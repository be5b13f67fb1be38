use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::audit::{self, AuditAction, AuditStore};
use crate::engine::service::IncentiveEngine;
use crate::ledger::store::{self as ledger_store, LedgerStore, LedgerStoreError};
use crate::ledger::types::{
    ApproverRole, IncentiveType, LedgerEntryRow, LedgerFilter,
};
use crate::performance::store as performance_store;
use crate::roster::Roster;
use crate::settings::service::SettingsService;
use crate::settings::store as settings_store;
use crate::settings::types::EffectiveConfig;
use crate::source::{MemoryLeadSource, SourceRecord};
use crate::sync::service::{ReconcileWindow, SyncService};

fn roster() -> Roster {
    Roster::from_spec("Aparna:u-aparna:prospector,Gauri:u-gauri:closer,Pushpa:u-pushpa:admin")
        .expect("roster")
}

fn window() -> ReconcileWindow {
    ReconcileWindow::new(
        Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2026, 8, 31, 23, 59, 59).unwrap(),
    )
}

fn po_record(record_id: &str, owner: &str) -> SourceRecord {
    SourceRecord {
        record_id: record_id.to_string(),
        lead_owner: owner.to_string(),
        sales_owner: None,
        client_company: Some("Acme Forge".to_string()),
        sql_date: None,
        po_date: Some(Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap()),
    }
}

fn sql_record(record_id: &str, owner: &str, po_date: Option<DateTime<Utc>>) -> SourceRecord {
    SourceRecord {
        record_id: record_id.to_string(),
        lead_owner: owner.to_string(),
        sales_owner: None,
        client_company: Some("Northwind".to_string()),
        sql_date: Some(Utc.with_ymd_and_hms(2026, 8, 7, 9, 0, 0).unwrap()),
        po_date,
    }
}

struct Harness {
    sync: SyncService,
    source: Arc<MemoryLeadSource>,
    ledger: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditStore>,
}

fn harness_with_ledger(ledger: Arc<dyn LedgerStore>) -> Harness {
    let source = MemoryLeadSource::shared();
    let performance = performance_store::memory();
    let audit = audit::memory();
    let settings = Arc::new(SettingsService::new(
        settings_store::memory(),
        audit.clone(),
        EffectiveConfig::default(),
    ));
    let engine = Arc::new(IncentiveEngine::new(
        ledger.clone(),
        performance,
        audit.clone(),
    ));
    let sync = SyncService::new(engine, settings, source.clone(), roster(), audit.clone());
    Harness {
        sync,
        source,
        ledger,
        audit,
    }
}

fn harness() -> Harness {
    harness_with_ledger(ledger_store::memory())
}

#[tokio::test]
async fn reconcile_creates_missing_entries_and_repeat_runs_skip() -> Result<()> {
    let harness = harness();
    harness.source.push(po_record("L-1", "Gauri")).await;
    harness.source.push(po_record("L-2", "Gauri")).await;
    harness
        .source
        .push(sql_record("L-3", "Aparna", Some(Utc.with_ymd_and_hms(2026, 8, 12, 9, 0, 0).unwrap())))
        .await;

    let first = harness.sync.reconcile(window(), "u-admin").await?;
    // Two closures, one SQL, one conversion bonus on the converted lead.
    assert_eq!(first.created, 4);
    assert_eq!(first.skipped, 0);
    assert!(first.errors.is_empty());
    assert!(!first.halted);

    let second = harness.sync.reconcile(window(), "u-admin").await?;
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 4);
    assert!(second.errors.is_empty());

    let conversions = harness
        .ledger
        .list_entries(&LedgerFilter {
            incentive_type: Some(IncentiveType::PoConversion),
            ..LedgerFilter::default()
        })
        .await?;
    assert_eq!(conversions.len(), 1);
    assert_eq!(conversions[0].amount, 200);
    Ok(())
}

#[tokio::test]
async fn reconcile_ignores_unrostered_and_ineligible_owners() -> Result<()> {
    let harness = harness();
    harness.source.push(po_record("L-10", "Unknown")).await;
    harness.source.push(po_record("L-11", "Pushpa")).await;
    harness.source.push(sql_record("L-12", "Gauri", None)).await;

    let summary = harness.sync.reconcile(window(), "u-admin").await?;
    assert_eq!(summary.created, 0);
    assert_eq!(summary.skipped, 0);
    assert!(summary.errors.is_empty());
    Ok(())
}

#[tokio::test]
async fn closure_owner_falls_back_to_the_lead_owner() -> Result<()> {
    let harness = harness();
    let mut record = po_record("L-20", "Gauri");
    record.sales_owner = Some("  ".to_string());
    harness.source.push(record).await;

    let summary = harness.sync.reconcile(window(), "u-admin").await?;
    assert_eq!(summary.created, 1);
    Ok(())
}

/// Ledger store that fails every write for one poisoned source record, to
/// exercise the batch's partial-failure path.
struct FailingLedgerStore {
    inner: Arc<dyn LedgerStore>,
    poison_record: String,
}

#[async_trait]
impl LedgerStore for FailingLedgerStore {
    async fn insert_entry(
        &self,
        entry: LedgerEntryRow,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        if entry.source_record_id == self.poison_record {
            return Err(LedgerStoreError::Db("storage offline".to_string()));
        }
        self.inner.insert_entry(entry).await
    }

    async fn get_entry(
        &self,
        entry_id: &str,
    ) -> Result<Option<LedgerEntryRow>, LedgerStoreError> {
        self.inner.get_entry(entry_id).await
    }

    async fn find_active(
        &self,
        source_record_id: &str,
        incentive_type: IncentiveType,
        beneficiary_id: &str,
    ) -> Result<Option<LedgerEntryRow>, LedgerStoreError> {
        self.inner
            .find_active(source_record_id, incentive_type, beneficiary_id)
            .await
    }

    async fn list_entries(
        &self,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntryRow>, LedgerStoreError> {
        self.inner.list_entries(filter).await
    }

    async fn approve_slot(
        &self,
        entry_id: &str,
        role: ApproverRole,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        self.inner.approve_slot(entry_id, role, actor_id, now).await
    }

    async fn revoke_slot(
        &self,
        entry_id: &str,
        role: ApproverRole,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        self.inner.revoke_slot(entry_id, role, now).await
    }

    async fn mark_paid(
        &self,
        entry_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        self.inner.mark_paid(entry_id, now).await
    }

    async fn reverse(
        &self,
        entry_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntryRow, LedgerStoreError> {
        self.inner.reverse(entry_id, reason, now).await
    }
}

#[tokio::test]
async fn one_failing_record_does_not_abort_the_batch() -> Result<()> {
    let failing = Arc::new(FailingLedgerStore {
        inner: ledger_store::memory(),
        poison_record: "L-33".to_string(),
    });
    let harness = harness_with_ledger(failing);
    for record_id in ["L-31", "L-32", "L-33", "L-34", "L-35"] {
        harness.source.push(po_record(record_id, "Gauri")).await;
    }

    let summary = harness.sync.reconcile(window(), "u-admin").await?;
    assert_eq!(summary.created, 4);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("L-33"));
    assert!(!summary.halted);

    // Retrying skips the four committed entries and re-reports the failure.
    let retry = harness.sync.reconcile(window(), "u-admin").await?;
    assert_eq!(retry.created, 0);
    assert_eq!(retry.skipped, 4);
    assert_eq!(retry.errors.len(), 1);
    Ok(())
}

#[tokio::test]
async fn an_expired_deadline_halts_the_run_cleanly() -> Result<()> {
    let harness = harness();
    harness.source.push(po_record("L-40", "Gauri")).await;
    harness.source.push(po_record("L-41", "Gauri")).await;

    let mut timeboxed = window();
    timeboxed.deadline = Some(Utc::now() - Duration::seconds(1));
    let summary = harness.sync.reconcile(timeboxed, "u-admin").await?;
    assert!(summary.halted);
    assert_eq!(summary.created, 0);

    // A later run without the deadline picks everything up.
    let summary = harness.sync.reconcile(window(), "u-admin").await?;
    assert_eq!(summary.created, 2);
    Ok(())
}

#[tokio::test]
async fn every_run_writes_one_summary_audit_record() -> Result<()> {
    let harness = harness();
    harness.source.push(po_record("L-50", "Gauri")).await;

    harness.sync.reconcile(window(), "u-admin").await?;
    harness.sync.reconcile(window(), "u-admin").await?;

    let trail = harness
        .audit
        .list_recent(Some(AuditAction::IncentivesSynced), 10)
        .await?;
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].details["skipped"], 1);
    Ok(())
}
