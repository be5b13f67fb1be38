use anyhow::Result;
use chrono::{TimeZone, Utc};

use crate::audit::{self, AuditAction, AuditStore};
use crate::engine::service::{DerivationOutcome, EngineError, IncentiveEngine};
use crate::ledger::store::{self, LedgerStore};
use crate::ledger::types::{EntryStatus, IncentiveType, LedgerFilter};
use crate::performance::store::{self as performance_store, PerformanceStore};
use crate::performance::types::QualifyingMetric;
use crate::roster::{IncentiveRole, RosterMember};
use crate::settings::types::EffectiveConfig;
use crate::source::SourceRecord;

fn engine() -> IncentiveEngine {
    IncentiveEngine::new(store::memory(), performance_store::memory(), audit::memory())
}

fn closer() -> RosterMember {
    RosterMember {
        user_id: "u-gauri".to_string(),
        display_name: "Gauri".to_string(),
        role: IncentiveRole::Closer,
    }
}

fn prospector() -> RosterMember {
    RosterMember {
        user_id: "u-aparna".to_string(),
        display_name: "Aparna".to_string(),
        role: IncentiveRole::Prospector,
    }
}

fn record(record_id: &str) -> SourceRecord {
    SourceRecord {
        record_id: record_id.to_string(),
        lead_owner: "Aparna".to_string(),
        sales_owner: Some("Gauri".to_string()),
        client_company: Some("Acme Forge".to_string()),
        sql_date: Some(Utc.with_ymd_and_hms(2026, 8, 3, 9, 0, 0).unwrap()),
        po_date: Some(Utc.with_ymd_and_hms(2026, 8, 5, 10, 0, 0).unwrap()),
    }
}

#[tokio::test]
async fn derivation_is_idempotent_per_triple() -> Result<()> {
    let engine = engine();
    let config = EffectiveConfig::default();

    let first = engine
        .derive_entry(&record("L-1"), IncentiveType::Sql, &prospector(), &config, "u-admin")
        .await?;
    let entry = first.created().expect("first derivation creates").clone();
    assert_eq!(entry.amount, 300);
    assert_eq!(entry.period, "2026-08");
    assert_eq!(entry.status, EntryStatus::Pending);

    let second = engine
        .derive_entry(&record("L-1"), IncentiveType::Sql, &prospector(), &config, "u-admin")
        .await?;
    assert!(matches!(second, DerivationOutcome::AlreadyExists));

    let entries = engine.ledger().list_entries(&LedgerFilter::default()).await?;
    assert_eq!(entries.len(), 1);
    Ok(())
}

#[tokio::test]
async fn amounts_are_capped_by_the_effective_cap() -> Result<()> {
    let engine = engine();
    let config = EffectiveConfig {
        sql_rate: 800,
        sql_cap: 500,
        ..EffectiveConfig::default()
    };

    let outcome = engine
        .derive_entry(&record("L-cap"), IncentiveType::Sql, &prospector(), &config, "u-admin")
        .await?;
    assert_eq!(outcome.created().expect("created").amount, 500);
    Ok(())
}

#[tokio::test]
async fn ineligible_beneficiaries_are_rejected() -> Result<()> {
    let engine = engine();
    let config = EffectiveConfig::default();

    let error = engine
        .derive_entry(&record("L-2"), IncentiveType::Closure, &prospector(), &config, "u-admin")
        .await
        .expect_err("prospector cannot take closure incentives");
    assert!(matches!(error, EngineError::Forbidden(_)));
    assert_eq!(error.code(), "forbidden");

    let error = engine
        .derive_entry(&record("L-2"), IncentiveType::Sql, &closer(), &config, "u-admin")
        .await
        .expect_err("closer cannot take sql incentives");
    assert!(matches!(error, EngineError::Forbidden(_)));
    Ok(())
}

#[tokio::test]
async fn milestone_bonuses_cannot_be_derived_from_source_records() -> Result<()> {
    let engine = engine();
    let error = engine
        .derive_entry(
            &record("L-3"),
            IncentiveType::BonusSqlMilestone,
            &closer(),
            &EffectiveConfig::default(),
            "u-admin",
        )
        .await
        .expect_err("bonus types come from counters");
    assert!(matches!(error, EngineError::InvalidState(_)));
    Ok(())
}

#[tokio::test]
async fn closure_derivation_feeds_the_po_counter_and_awards_the_milestone() -> Result<()> {
    let engine = engine();
    let config = EffectiveConfig {
        po_milestone_threshold: 2,
        ..EffectiveConfig::default()
    };

    engine
        .derive_entry(&record("L-10"), IncentiveType::Closure, &closer(), &config, "u-admin")
        .await?;
    let counter = engine
        .performance()
        .get("u-gauri", "2026-08")
        .await?
        .expect("counter exists");
    assert_eq!(counter.po_count, 1);
    assert!(!counter.po_milestone_bonus_paid);

    engine
        .derive_entry(&record("L-11"), IncentiveType::Closure, &closer(), &config, "u-admin")
        .await?;
    let counter = engine
        .performance()
        .get("u-gauri", "2026-08")
        .await?
        .expect("counter exists");
    assert_eq!(counter.po_count, 2);
    assert!(counter.po_milestone_bonus_paid);
    assert_eq!(counter.total_bonuses, 50_000);

    let bonuses = engine
        .ledger()
        .list_entries(&LedgerFilter {
            incentive_type: Some(IncentiveType::BonusPoMilestone),
            ..LedgerFilter::default()
        })
        .await?;
    assert_eq!(bonuses.len(), 1);
    assert_eq!(bonuses[0].amount, 50_000);
    assert_eq!(bonuses[0].status, EntryStatus::Approved);

    // A third PO does not pay the milestone again.
    engine
        .derive_entry(&record("L-12"), IncentiveType::Closure, &closer(), &config, "u-admin")
        .await?;
    let bonuses = engine
        .ledger()
        .list_entries(&LedgerFilter {
            incentive_type: Some(IncentiveType::BonusPoMilestone),
            ..LedgerFilter::default()
        })
        .await?;
    assert_eq!(bonuses.len(), 1);
    Ok(())
}

#[tokio::test]
async fn sql_milestone_pays_exactly_once_at_the_threshold() -> Result<()> {
    let engine = engine();
    let config = EffectiveConfig::default(); // threshold 10, bonus 10_000
    let member = closer();

    for _ in 0..9 {
        engine
            .record_qualifying_event(&member, "2026-08", QualifyingMetric::SqlClosed, &config, "u-admin")
            .await?;
    }
    let bonuses = engine
        .ledger()
        .list_entries(&LedgerFilter {
            incentive_type: Some(IncentiveType::BonusSqlMilestone),
            ..LedgerFilter::default()
        })
        .await?;
    assert!(bonuses.is_empty());

    let (counter, awarded) = engine
        .record_qualifying_event(&member, "2026-08", QualifyingMetric::SqlClosed, &config, "u-admin")
        .await?;
    assert_eq!(counter.sql_closed_count, 10);
    assert_eq!(awarded.len(), 1);
    assert_eq!(awarded[0].amount, 10_000);

    let (_, awarded) = engine
        .record_qualifying_event(&member, "2026-08", QualifyingMetric::SqlClosed, &config, "u-admin")
        .await?;
    assert!(awarded.is_empty());

    // Re-evaluating with an unchanged counter is a no-op too.
    let awarded = engine
        .evaluate_milestones(&member, "2026-08", &config, "u-admin")
        .await?;
    assert!(awarded.is_empty());
    Ok(())
}

#[tokio::test]
async fn a_new_period_can_pay_the_milestone_again() -> Result<()> {
    let engine = engine();
    let config = EffectiveConfig {
        sql_milestone_threshold: 1,
        ..EffectiveConfig::default()
    };
    let member = closer();

    let (_, august) = engine
        .record_qualifying_event(&member, "2026-08", QualifyingMetric::SqlClosed, &config, "u-admin")
        .await?;
    let (_, september) = engine
        .record_qualifying_event(&member, "2026-09", QualifyingMetric::SqlClosed, &config, "u-admin")
        .await?;
    assert_eq!(august.len(), 1);
    assert_eq!(september.len(), 1);
    assert_ne!(august[0].source_record_id, september[0].source_record_id);
    Ok(())
}

#[tokio::test]
async fn reversal_is_terminal_and_distinguishable() -> Result<()> {
    let engine = engine();
    let config = EffectiveConfig::default();

    let entry = engine
        .derive_entry(&record("L-20"), IncentiveType::Sql, &prospector(), &config, "u-admin")
        .await?
        .created()
        .expect("created")
        .clone();

    let reversed = engine
        .reverse_entry(entry.entry_id.as_str(), "lead rejected", "u-admin")
        .await?;
    assert_eq!(reversed.status, EntryStatus::Reversed);
    assert_eq!(reversed.reversal_reason.as_deref(), Some("lead rejected"));
    assert!(reversed.reversed_at.is_some());

    let error = engine
        .reverse_entry(entry.entry_id.as_str(), "again", "u-admin")
        .await
        .expect_err("second reversal must fail");
    assert!(matches!(error, EngineError::AlreadyReversed));
    assert_eq!(error.code(), "already_reversed");

    let error = engine
        .reverse_entry("inc_missing", "noop", "u-admin")
        .await
        .expect_err("unknown entry must fail");
    assert!(matches!(error, EngineError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn reversal_frees_the_idempotence_key_for_rederivation() -> Result<()> {
    let engine = engine();
    let config = EffectiveConfig::default();

    let entry = engine
        .derive_entry(&record("L-21"), IncentiveType::Sql, &prospector(), &config, "u-admin")
        .await?
        .created()
        .expect("created")
        .clone();
    engine
        .reverse_entry(entry.entry_id.as_str(), "rate was wrong", "u-admin")
        .await?;

    let outcome = engine
        .derive_entry(&record("L-21"), IncentiveType::Sql, &prospector(), &config, "u-admin")
        .await?;
    let fresh = outcome.created().expect("rederivation creates");
    assert_ne!(fresh.entry_id, entry.entry_id);

    let entries = engine.ledger().list_entries(&LedgerFilter::default()).await?;
    assert_eq!(entries.len(), 2);
    Ok(())
}

#[tokio::test]
async fn reversing_a_qualifying_entry_does_not_correct_counters() -> Result<()> {
    // Known consistency gap, preserved deliberately: the counter that gated a
    // milestone is not decremented when the underlying entry is reversed.
    let engine = engine();
    let config = EffectiveConfig {
        po_milestone_threshold: 1,
        ..EffectiveConfig::default()
    };

    let entry = engine
        .derive_entry(&record("L-30"), IncentiveType::Closure, &closer(), &config, "u-admin")
        .await?
        .created()
        .expect("created")
        .clone();
    let counter = engine
        .performance()
        .get("u-gauri", "2026-08")
        .await?
        .expect("counter");
    assert_eq!(counter.po_count, 1);
    assert!(counter.po_milestone_bonus_paid);

    engine
        .reverse_entry(entry.entry_id.as_str(), "po cancelled", "u-admin")
        .await?;
    let counter = engine
        .performance()
        .get("u-gauri", "2026-08")
        .await?
        .expect("counter");
    assert_eq!(counter.po_count, 1);
    assert!(counter.po_milestone_bonus_paid);
    Ok(())
}

#[tokio::test]
async fn milestone_bonus_entries_are_reversible_like_any_other() -> Result<()> {
    // The source behavior is ambiguous on whether awarded bonuses can be
    // reversed; they go through the same path as every other entry type.
    let engine = engine();
    let config = EffectiveConfig {
        po_milestone_threshold: 1,
        ..EffectiveConfig::default()
    };

    engine
        .derive_entry(&record("L-40"), IncentiveType::Closure, &closer(), &config, "u-admin")
        .await?;
    let bonuses = engine
        .ledger()
        .list_entries(&LedgerFilter {
            incentive_type: Some(IncentiveType::BonusPoMilestone),
            ..LedgerFilter::default()
        })
        .await?;
    assert_eq!(bonuses.len(), 1);

    let reversed = engine
        .reverse_entry(bonuses[0].entry_id.as_str(), "awarded in error", "u-admin")
        .await?;
    assert_eq!(reversed.status, EntryStatus::Reversed);
    Ok(())
}

#[tokio::test]
async fn derivations_and_reversals_are_audited() -> Result<()> {
    let audit = audit::memory();
    let engine = IncentiveEngine::new(store::memory(), performance_store::memory(), audit.clone());
    let config = EffectiveConfig::default();

    let entry = engine
        .derive_entry(&record("L-50"), IncentiveType::Sql, &prospector(), &config, "u-admin")
        .await?
        .created()
        .expect("created")
        .clone();
    engine
        .reverse_entry(entry.entry_id.as_str(), "cleanup", "u-admin")
        .await?;

    let created = audit
        .list_recent(Some(AuditAction::IncentiveCreated), 10)
        .await?;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].entity_id, entry.entry_id);

    let reversed = audit
        .list_recent(Some(AuditAction::IncentiveReversed), 10)
        .await?;
    assert_eq!(reversed.len(), 1);
    assert_eq!(reversed[0].details["reason"], "cleanup");
    Ok(())
}
