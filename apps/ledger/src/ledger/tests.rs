use anyhow::Result;
use chrono::{TimeZone, Utc};

use crate::ledger::store::{self, LedgerStore, LedgerStoreError};
use crate::ledger::types::{
    ApproverRole, EntryStatus, IncentiveType, LedgerEntryRow, period_for,
};

fn entry(entry_id: &str, source_record_id: &str, incentive_type: IncentiveType) -> LedgerEntryRow {
    LedgerEntryRow {
        entry_id: entry_id.to_string(),
        beneficiary_id: "u-gauri".to_string(),
        beneficiary_name: "Gauri".to_string(),
        source_record_id: source_record_id.to_string(),
        client_company: Some("Acme Forge".to_string()),
        incentive_type,
        amount: 1_000,
        period: "2026-08".to_string(),
        description: "PO incentive: Acme Forge".to_string(),
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
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn the_active_triple_is_unique() -> Result<()> {
    let store = store::memory();
    store
        .insert_entry(entry("inc_1", "L-1", IncentiveType::Closure))
        .await?;

    let error = store
        .insert_entry(entry("inc_2", "L-1", IncentiveType::Closure))
        .await
        .expect_err("same triple must collide");
    assert!(matches!(error, LedgerStoreError::Duplicate(_)));

    // A different incentive type for the same record is a different triple.
    store
        .insert_entry(entry("inc_3", "L-1", IncentiveType::Sql))
        .await?;
    Ok(())
}

#[tokio::test]
async fn reversal_releases_the_triple() -> Result<()> {
    let store = store::memory();
    store
        .insert_entry(entry("inc_1", "L-2", IncentiveType::Closure))
        .await?;
    store.reverse("inc_1", "po cancelled", Utc::now()).await?;

    // The reversed entry stays readable; a replacement can be inserted.
    store
        .insert_entry(entry("inc_2", "L-2", IncentiveType::Closure))
        .await?;
    let reversed = store.get_entry("inc_1").await?.expect("reversed entry kept");
    assert_eq!(reversed.status, EntryStatus::Reversed);

    let active = store
        .find_active("L-2", IncentiveType::Closure, "u-gauri")
        .await?
        .expect("replacement is the active entry");
    assert_eq!(active.entry_id, "inc_2");
    Ok(())
}

#[tokio::test]
async fn approval_slots_recompute_status_atomically() -> Result<()> {
    let store = store::memory();
    store
        .insert_entry(entry("inc_1", "L-3", IncentiveType::Closure))
        .await?;
    let now = Utc::now();

    let error = store
        .approve_slot("inc_1", ApproverRole::Ceo, "u-ceo", now)
        .await
        .expect_err("ceo slot before admin slot");
    assert!(matches!(error, LedgerStoreError::OrderingViolation(_)));

    let after_admin = store
        .approve_slot("inc_1", ApproverRole::Admin, "u-admin", now)
        .await?;
    assert_eq!(after_admin.status, EntryStatus::Pending);

    let after_ceo = store
        .approve_slot("inc_1", ApproverRole::Ceo, "u-ceo", now)
        .await?;
    assert_eq!(after_ceo.status, EntryStatus::Approved);
    assert!(after_ceo.admin_approved && after_ceo.ceo_approved);

    let after_revoke = store.revoke_slot("inc_1", ApproverRole::Ceo, now).await?;
    assert_eq!(after_revoke.status, EntryStatus::Pending);
    assert!(after_revoke.admin_approved);
    assert!(!after_revoke.ceo_approved);
    Ok(())
}

#[tokio::test]
async fn paying_requires_the_approved_status() -> Result<()> {
    let store = store::memory();
    store
        .insert_entry(entry("inc_1", "L-4", IncentiveType::Closure))
        .await?;
    let now = Utc::now();

    let error = store
        .mark_paid("inc_1", now)
        .await
        .expect_err("pending entries cannot be paid");
    assert!(matches!(error, LedgerStoreError::InvalidState(_)));

    store
        .approve_slot("inc_1", ApproverRole::Admin, "u-admin", now)
        .await?;
    store
        .approve_slot("inc_1", ApproverRole::Ceo, "u-ceo", now)
        .await?;
    let paid = store.mark_paid("inc_1", now).await?;
    assert_eq!(paid.status, EntryStatus::Paid);
    assert_eq!(paid.paid_at, Some(now));
    Ok(())
}

#[tokio::test]
async fn transitions_on_missing_entries_are_not_found() -> Result<()> {
    let store = store::memory();
    let now = Utc::now();

    let error = store
        .approve_slot("inc_missing", ApproverRole::Admin, "u-admin", now)
        .await
        .expect_err("missing entry");
    assert!(matches!(error, LedgerStoreError::NotFound(_)));

    let error = store
        .reverse("inc_missing", "noop", now)
        .await
        .expect_err("missing entry");
    assert!(matches!(error, LedgerStoreError::NotFound(_)));
    Ok(())
}

#[test]
fn periods_bucket_by_calendar_month() {
    let date = Utc.with_ymd_and_hms(2026, 2, 28, 23, 59, 59).unwrap();
    assert_eq!(period_for(date), "2026-02");
}
