use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::LedgerDb;

/// Snapshot of an external lead/deal record. The source is read-only to this
/// service: a stable identifier, the owning agents, and the dated lifecycle
/// milestones are all we consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub record_id: String,
    pub lead_owner: String,
    pub sales_owner: Option<String>,
    pub client_company: Option<String>,
    pub sql_date: Option<DateTime<Utc>>,
    pub po_date: Option<DateTime<Utc>>,
}

impl SourceRecord {
    /// Owner credited for a closure incentive: the sales owner when assigned,
    /// else the lead owner.
    pub fn closure_owner(&self) -> &str {
        self.sales_owner
            .as_deref()
            .filter(|owner| !owner.trim().is_empty())
            .unwrap_or(self.lead_owner.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("db error: {0}")]
    Db(String),
}

#[async_trait]
pub trait LeadSource: Send + Sync {
    async fn list_po_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SourceRecord>, SourceError>;

    async fn list_sql_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SourceRecord>, SourceError>;
}

pub fn postgres(db: Arc<LedgerDb>) -> Arc<dyn LeadSource> {
    Arc::new(PostgresLeadSource { db })
}

/// In-memory source for harnesses and tests.
#[derive(Default)]
pub struct MemoryLeadSource {
    records: Mutex<Vec<SourceRecord>>,
}

impl MemoryLeadSource {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn push(&self, record: SourceRecord) {
        let mut records = self.records.lock().await;
        records.push(record);
    }
}

#[async_trait]
impl LeadSource for MemoryLeadSource {
    async fn list_po_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SourceRecord>, SourceError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|record| {
                record
                    .po_date
                    .is_some_and(|date| date >= start && date <= end)
            })
            .cloned()
            .collect())
    }

    async fn list_sql_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SourceRecord>, SourceError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|record| {
                record
                    .sql_date
                    .is_some_and(|date| date >= start && date <= end)
            })
            .cloned()
            .collect())
    }
}

struct PostgresLeadSource {
    db: Arc<LedgerDb>,
}

const SOURCE_COLUMNS: &str =
    "record_id, lead_owner, sales_owner, client_company, sql_date, po_date";

#[async_trait]
impl LeadSource for PostgresLeadSource {
    async fn list_po_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SourceRecord>, SourceError> {
        let client = self.db.client();
        let client = client.lock().await;
        let rows = client
            .query(
                &format!(
                    "SELECT {SOURCE_COLUMNS} FROM ledger.lead_records \
                     WHERE po_date IS NOT NULL AND po_date >= $1 AND po_date <= $2 \
                     ORDER BY po_date DESC"
                ),
                &[&start, &end],
            )
            .await
            .map_err(|error| SourceError::Db(error.to_string()))?;
        rows.iter()
            .map(map_source_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SourceError::Db)
    }

    async fn list_sql_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SourceRecord>, SourceError> {
        let client = self.db.client();
        let client = client.lock().await;
        let rows = client
            .query(
                &format!(
                    "SELECT {SOURCE_COLUMNS} FROM ledger.lead_records \
                     WHERE sql_date IS NOT NULL AND sql_date >= $1 AND sql_date <= $2 \
                     ORDER BY sql_date DESC"
                ),
                &[&start, &end],
            )
            .await
            .map_err(|error| SourceError::Db(error.to_string()))?;
        rows.iter()
            .map(map_source_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SourceError::Db)
    }
}

fn map_source_row(row: &tokio_postgres::Row) -> Result<SourceRecord, String> {
    Ok(SourceRecord {
        record_id: row.try_get("record_id").map_err(|e| e.to_string())?,
        lead_owner: row.try_get("lead_owner").map_err(|e| e.to_string())?,
        sales_owner: row.try_get("sales_owner").map_err(|e| e.to_string())?,
        client_company: row.try_get("client_company").map_err(|e| e.to_string())?,
        sql_date: row.try_get("sql_date").map_err(|e| e.to_string())?,
        po_date: row.try_get("po_date").map_err(|e| e.to_string())?,
    })
}
