use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which monthly counter a qualifying event feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifyingMetric {
    SqlClosed,
    Po,
}

impl QualifyingMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SqlClosed => "sql_closed",
            Self::Po => "po",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    Sql,
    Po,
}

impl MilestoneKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Po => "po",
        }
    }
}

/// Per-user-per-month performance counters. Created lazily on the first
/// qualifying event; counts only grow, and the milestone flags are one-way so
/// each milestone bonus pays at most once per user per period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceCounterRow {
    pub user_id: String,
    pub period: String,
    pub sql_closed_count: i64,
    pub po_count: i64,
    pub sql_milestone_bonus_paid: bool,
    pub po_milestone_bonus_paid: bool,
    pub total_bonuses: i64,
    pub total_earnings: i64,
    pub updated_at: DateTime<Utc>,
}

impl PerformanceCounterRow {
    pub fn empty(user_id: &str, period: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            period: period.to_string(),
            sql_closed_count: 0,
            po_count: 0,
            sql_milestone_bonus_paid: false,
            po_milestone_bonus_paid: false,
            total_bonuses: 0,
            total_earnings: 0,
            updated_at: now,
        }
    }

    pub fn count_for(&self, metric: QualifyingMetric) -> i64 {
        match metric {
            QualifyingMetric::SqlClosed => self.sql_closed_count,
            QualifyingMetric::Po => self.po_count,
        }
    }

    pub fn milestone_paid(&self, kind: MilestoneKind) -> bool {
        match kind {
            MilestoneKind::Sql => self.sql_milestone_bonus_paid,
            MilestoneKind::Po => self.po_milestone_bonus_paid,
        }
    }
}
