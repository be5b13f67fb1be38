use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::LedgerDb;
use crate::performance::types::{MilestoneKind, PerformanceCounterRow, QualifyingMetric};

#[derive(Debug, thiserror::Error)]
pub enum PerformanceStoreError {
    #[error("db error: {0}")]
    Db(String),
}

/// Counter mutations are increment-shaped store operations, never
/// application-level read-modify-write, so concurrent qualifying events for
/// the same user/period cannot lose updates.
#[async_trait]
pub trait PerformanceStore: Send + Sync {
    async fn increment(
        &self,
        user_id: &str,
        period: &str,
        metric: QualifyingMetric,
        now: DateTime<Utc>,
    ) -> Result<PerformanceCounterRow, PerformanceStoreError>;

    async fn get(
        &self,
        user_id: &str,
        period: &str,
    ) -> Result<Option<PerformanceCounterRow>, PerformanceStoreError>;

    /// One-way flag claim. Returns true when this call flipped the flag from
    /// unset to set; false when it was already claimed.
    async fn claim_milestone(
        &self,
        user_id: &str,
        period: &str,
        kind: MilestoneKind,
        now: DateTime<Utc>,
    ) -> Result<bool, PerformanceStoreError>;

    async fn add_totals(
        &self,
        user_id: &str,
        period: &str,
        bonuses_delta: i64,
        earnings_delta: i64,
        now: DateTime<Utc>,
    ) -> Result<PerformanceCounterRow, PerformanceStoreError>;
}

pub fn memory() -> Arc<dyn PerformanceStore> {
    Arc::new(MemoryPerformanceStore::default())
}

pub fn postgres(db: Arc<LedgerDb>) -> Arc<dyn PerformanceStore> {
    Arc::new(PostgresPerformanceStore { db })
}

#[derive(Default)]
struct MemoryPerformanceStore {
    counters: Mutex<HashMap<(String, String), PerformanceCounterRow>>,
}

impl MemoryPerformanceStore {
    fn key(user_id: &str, period: &str) -> (String, String) {
        (user_id.to_string(), period.to_string())
    }
}

#[async_trait]
impl PerformanceStore for MemoryPerformanceStore {
    async fn increment(
        &self,
        user_id: &str,
        period: &str,
        metric: QualifyingMetric,
        now: DateTime<Utc>,
    ) -> Result<PerformanceCounterRow, PerformanceStoreError> {
        let mut counters = self.counters.lock().await;
        let counter = counters
            .entry(Self::key(user_id, period))
            .or_insert_with(|| PerformanceCounterRow::empty(user_id, period, now));
        match metric {
            QualifyingMetric::SqlClosed => {
                counter.sql_closed_count = counter.sql_closed_count.saturating_add(1);
            }
            QualifyingMetric::Po => {
                counter.po_count = counter.po_count.saturating_add(1);
            }
        }
        counter.updated_at = now;
        Ok(counter.clone())
    }

    async fn get(
        &self,
        user_id: &str,
        period: &str,
    ) -> Result<Option<PerformanceCounterRow>, PerformanceStoreError> {
        let counters = self.counters.lock().await;
        Ok(counters.get(&Self::key(user_id, period)).cloned())
    }

    async fn claim_milestone(
        &self,
        user_id: &str,
        period: &str,
        kind: MilestoneKind,
        now: DateTime<Utc>,
    ) -> Result<bool, PerformanceStoreError> {
        let mut counters = self.counters.lock().await;
        let counter = counters
            .entry(Self::key(user_id, period))
            .or_insert_with(|| PerformanceCounterRow::empty(user_id, period, now));
        let flag = match kind {
            MilestoneKind::Sql => &mut counter.sql_milestone_bonus_paid,
            MilestoneKind::Po => &mut counter.po_milestone_bonus_paid,
        };
        if *flag {
            return Ok(false);
        }
        *flag = true;
        counter.updated_at = now;
        Ok(true)
    }

    async fn add_totals(
        &self,
        user_id: &str,
        period: &str,
        bonuses_delta: i64,
        earnings_delta: i64,
        now: DateTime<Utc>,
    ) -> Result<PerformanceCounterRow, PerformanceStoreError> {
        let mut counters = self.counters.lock().await;
        let counter = counters
            .entry(Self::key(user_id, period))
            .or_insert_with(|| PerformanceCounterRow::empty(user_id, period, now));
        counter.total_bonuses = counter.total_bonuses.saturating_add(bonuses_delta);
        counter.total_earnings = counter.total_earnings.saturating_add(earnings_delta);
        counter.updated_at = now;
        Ok(counter.clone())
    }
}

struct PostgresPerformanceStore {
    db: Arc<LedgerDb>,
}

const COUNTER_COLUMNS: &str = "user_id, period, sql_closed_count, po_count, \
     sql_milestone_bonus_paid, po_milestone_bonus_paid, total_bonuses, total_earnings, updated_at";

#[async_trait]
impl PerformanceStore for PostgresPerformanceStore {
    async fn increment(
        &self,
        user_id: &str,
        period: &str,
        metric: QualifyingMetric,
        now: DateTime<Utc>,
    ) -> Result<PerformanceCounterRow, PerformanceStoreError> {
        let column = match metric {
            QualifyingMetric::SqlClosed => "sql_closed_count",
            QualifyingMetric::Po => "po_count",
        };
        let client = self.db.client();
        let client = client.lock().await;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO ledger.performance_counters (user_id, period, {column}, updated_at) \
                     VALUES ($1, $2, 1, $3) \
                     ON CONFLICT (user_id, period) DO UPDATE \
                        SET {column} = ledger.performance_counters.{column} + 1, updated_at = $3 \
                     RETURNING {COUNTER_COLUMNS}"
                ),
                &[&user_id, &period, &now],
            )
            .await
            .map_err(|error| PerformanceStoreError::Db(error.to_string()))?;
        map_counter_row(&row).map_err(PerformanceStoreError::Db)
    }

    async fn get(
        &self,
        user_id: &str,
        period: &str,
    ) -> Result<Option<PerformanceCounterRow>, PerformanceStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {COUNTER_COLUMNS} FROM ledger.performance_counters \
                     WHERE user_id = $1 AND period = $2"
                ),
                &[&user_id, &period],
            )
            .await
            .map_err(|error| PerformanceStoreError::Db(error.to_string()))?;
        row.as_ref()
            .map(map_counter_row)
            .transpose()
            .map_err(PerformanceStoreError::Db)
    }

    async fn claim_milestone(
        &self,
        user_id: &str,
        period: &str,
        kind: MilestoneKind,
        now: DateTime<Utc>,
    ) -> Result<bool, PerformanceStoreError> {
        let column = match kind {
            MilestoneKind::Sql => "sql_milestone_bonus_paid",
            MilestoneKind::Po => "po_milestone_bonus_paid",
        };
        let client = self.db.client();
        let client = client.lock().await;
        client
            .execute(
                "INSERT INTO ledger.performance_counters (user_id, period, updated_at) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (user_id, period) DO NOTHING",
                &[&user_id, &period, &now],
            )
            .await
            .map_err(|error| PerformanceStoreError::Db(error.to_string()))?;
        let claimed = client
            .execute(
                &format!(
                    "UPDATE ledger.performance_counters \
                        SET {column} = TRUE, updated_at = $3 \
                      WHERE user_id = $1 AND period = $2 AND {column} = FALSE"
                ),
                &[&user_id, &period, &now],
            )
            .await
            .map_err(|error| PerformanceStoreError::Db(error.to_string()))?;
        Ok(claimed == 1)
    }

    async fn add_totals(
        &self,
        user_id: &str,
        period: &str,
        bonuses_delta: i64,
        earnings_delta: i64,
        now: DateTime<Utc>,
    ) -> Result<PerformanceCounterRow, PerformanceStoreError> {
        let client = self.db.client();
        let client = client.lock().await;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO ledger.performance_counters \
                        (user_id, period, total_bonuses, total_earnings, updated_at) \
                     VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT (user_id, period) DO UPDATE \
                        SET total_bonuses = ledger.performance_counters.total_bonuses + $3, \
                            total_earnings = ledger.performance_counters.total_earnings + $4, \
                            updated_at = $5 \
                     RETURNING {COUNTER_COLUMNS}"
                ),
                &[&user_id, &period, &bonuses_delta, &earnings_delta, &now],
            )
            .await
            .map_err(|error| PerformanceStoreError::Db(error.to_string()))?;
        map_counter_row(&row).map_err(PerformanceStoreError::Db)
    }
}

fn map_counter_row(row: &tokio_postgres::Row) -> Result<PerformanceCounterRow, String> {
    Ok(PerformanceCounterRow {
        user_id: row.try_get("user_id").map_err(|e| e.to_string())?,
        period: row.try_get("period").map_err(|e| e.to_string())?,
        sql_closed_count: row.try_get("sql_closed_count").map_err(|e| e.to_string())?,
        po_count: row.try_get("po_count").map_err(|e| e.to_string())?,
        sql_milestone_bonus_paid: row
            .try_get("sql_milestone_bonus_paid")
            .map_err(|e| e.to_string())?,
        po_milestone_bonus_paid: row
            .try_get("po_milestone_bonus_paid")
            .map_err(|e| e.to_string())?,
        total_bonuses: row.try_get("total_bonuses").map_err(|e| e.to_string())?,
        total_earnings: row.try_get("total_earnings").map_err(|e| e.to_string())?,
        updated_at: row.try_get("updated_at").map_err(|e| e.to_string())?,
    })
}
