#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;

use crate::{
    approval::service::ApprovalService,
    audit::AuditStore,
    config::Config,
    db::LedgerDb,
    engine::service::IncentiveEngine,
    settings::service::SettingsService,
    source::LeadSource,
    sync::service::SyncService,
};

pub mod approval;
pub mod audit;
pub mod config;
pub mod db;
pub mod engine;
pub mod ledger;
pub mod performance;
pub mod roster;
pub mod settings;
pub mod source;
pub mod sync;

/// Wired service graph. The HTTP surface (out of scope here) holds one of
/// these and maps endpoints onto the service operations.
pub struct LedgerState {
    pub settings: Arc<SettingsService>,
    pub engine: Arc<IncentiveEngine>,
    pub approvals: Arc<ApprovalService>,
    pub sync: Arc<SyncService>,
    pub audit: Arc<dyn AuditStore>,
}

pub fn build_memory_state(config: &Config, source: Arc<dyn LeadSource>) -> LedgerState {
    let audit = audit::memory();
    let ledger_store = ledger::store::memory();
    let performance_store = performance::store::memory();
    let settings = Arc::new(SettingsService::new(
        settings::store::memory(),
        audit.clone(),
        config.incentive_defaults.clone(),
    ));
    let engine = Arc::new(IncentiveEngine::new(
        ledger_store.clone(),
        performance_store.clone(),
        audit.clone(),
    ));
    let approvals = Arc::new(ApprovalService::new(
        ledger_store,
        performance_store,
        audit.clone(),
    ));
    let sync = Arc::new(SyncService::new(
        engine.clone(),
        settings.clone(),
        source,
        config.roster.clone(),
        audit.clone(),
    ));
    LedgerState {
        settings,
        engine,
        approvals,
        sync,
        audit,
    }
}

pub async fn build_postgres_state(config: &Config) -> Result<LedgerState> {
    let db_url = config
        .db_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("DB_URL is required for a postgres-backed state"))?;
    let db = Arc::new(LedgerDb::connect(db_url.as_str()).await?);

    let audit = audit::postgres(db.clone());
    let ledger_store = ledger::store::postgres(db.clone());
    let performance_store = performance::store::postgres(db.clone());
    let settings = Arc::new(SettingsService::new(
        settings::store::postgres(db.clone()),
        audit.clone(),
        config.incentive_defaults.clone(),
    ));
    let engine = Arc::new(IncentiveEngine::new(
        ledger_store.clone(),
        performance_store.clone(),
        audit.clone(),
    ));
    let approvals = Arc::new(ApprovalService::new(
        ledger_store,
        performance_store,
        audit.clone(),
    ));
    let sync = Arc::new(SyncService::new(
        engine.clone(),
        settings.clone(),
        source::postgres(db),
        config.roster.clone(),
        audit.clone(),
    ));
    Ok(LedgerState {
        settings,
        engine,
        approvals,
        sync,
        audit,
    })
}
