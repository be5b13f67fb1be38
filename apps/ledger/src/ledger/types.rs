use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncentiveType {
    Sql,
    PoConversion,
    Closure,
    BonusSqlMilestone,
    BonusPoMilestone,
}

impl IncentiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::PoConversion => "po_conversion",
            Self::Closure => "closure",
            Self::BonusSqlMilestone => "bonus_sql_milestone",
            Self::BonusPoMilestone => "bonus_po_milestone",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sql" => Some(Self::Sql),
            "po_conversion" => Some(Self::PoConversion),
            "closure" => Some(Self::Closure),
            "bonus_sql_milestone" => Some(Self::BonusSqlMilestone),
            "bonus_po_milestone" => Some(Self::BonusPoMilestone),
            _ => None,
        }
    }

    /// Approval discipline fixed per incentive type at creation time.
    /// Milestone bonuses are system-computed and skip the dual gate.
    pub fn workflow(self) -> ApprovalWorkflow {
        match self {
            Self::Sql | Self::PoConversion | Self::Closure => ApprovalWorkflow::DualApprover,
            Self::BonusSqlMilestone | Self::BonusPoMilestone => ApprovalWorkflow::SingleApprover,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Approved,
    Paid,
    Reversed,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Reversed => "reversed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "paid" => Some(Self::Paid),
            "reversed" => Some(Self::Reversed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalWorkflow {
    DualApprover,
    SingleApprover,
}

impl ApprovalWorkflow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DualApprover => "dual_approver",
            Self::SingleApprover => "single_approver",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "dual_approver" => Some(Self::DualApprover),
            "single_approver" => Some(Self::SingleApprover),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproverRole {
    Admin,
    Ceo,
}

impl ApproverRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Ceo => "ceo",
        }
    }
}

/// One incentive ledger entry. `(source_record_id, incentive_type,
/// beneficiary_id)` is the idempotence key: at most one non-reversed entry may
/// exist per triple. `beneficiary_name` and `client_company` are display
/// snapshots taken at creation time and intentionally never re-synced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryRow {
    pub entry_id: String,
    pub beneficiary_id: String,
    pub beneficiary_name: String,
    pub source_record_id: String,
    pub client_company: Option<String>,
    pub incentive_type: IncentiveType,
    pub amount: i64,
    pub period: String,
    pub description: String,
    pub workflow: ApprovalWorkflow,
    pub admin_approved: bool,
    pub admin_approved_by: Option<String>,
    pub admin_approved_at: Option<DateTime<Utc>>,
    pub ceo_approved: bool,
    pub ceo_approved_by: Option<String>,
    pub ceo_approved_at: Option<DateTime<Utc>>,
    pub status: EntryStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversal_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntryRow {
    pub fn is_terminal(&self) -> bool {
        self.status == EntryStatus::Reversed
    }
}

#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub beneficiary_id: Option<String>,
    pub period: Option<String>,
    pub status: Option<EntryStatus>,
    pub incentive_type: Option<IncentiveType>,
}

/// Month bucket (`YYYY-MM`) an incentive is attributed to.
pub fn period_for(date: DateTime<Utc>) -> String {
    date.format("%Y-%m").to_string()
}
