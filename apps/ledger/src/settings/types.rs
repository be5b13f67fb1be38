use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    SqlRate,
    SqlCap,
    ClosureRate,
    ClosureCap,
    PoConversionBonus,
    SqlMilestoneThreshold,
    SqlMilestoneBonus,
    PoMilestoneThreshold,
    PoMilestoneBonus,
}

impl SettingKey {
    pub const ALL: [Self; 9] = [
        Self::SqlRate,
        Self::SqlCap,
        Self::ClosureRate,
        Self::ClosureCap,
        Self::PoConversionBonus,
        Self::SqlMilestoneThreshold,
        Self::SqlMilestoneBonus,
        Self::PoMilestoneThreshold,
        Self::PoMilestoneBonus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SqlRate => "sql_rate",
            Self::SqlCap => "sql_cap",
            Self::ClosureRate => "closure_rate",
            Self::ClosureCap => "closure_cap",
            Self::PoConversionBonus => "po_conversion_bonus",
            Self::SqlMilestoneThreshold => "sql_milestone_threshold",
            Self::SqlMilestoneBonus => "sql_milestone_bonus",
            Self::PoMilestoneThreshold => "po_milestone_threshold",
            Self::PoMilestoneBonus => "po_milestone_bonus",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "sql_rate" => Some(Self::SqlRate),
            "sql_cap" => Some(Self::SqlCap),
            "closure_rate" => Some(Self::ClosureRate),
            "closure_cap" => Some(Self::ClosureCap),
            "po_conversion_bonus" => Some(Self::PoConversionBonus),
            "sql_milestone_threshold" => Some(Self::SqlMilestoneThreshold),
            "sql_milestone_bonus" => Some(Self::SqlMilestoneBonus),
            "po_milestone_threshold" => Some(Self::PoMilestoneThreshold),
            "po_milestone_bonus" => Some(Self::PoMilestoneBonus),
            _ => None,
        }
    }

    /// The cap a rate key is bounded by, if any.
    pub fn cap_key(self) -> Option<Self> {
        match self {
            Self::SqlRate => Some(Self::SqlCap),
            Self::ClosureRate => Some(Self::ClosureCap),
            _ => None,
        }
    }

    /// The rate a cap key bounds, if any.
    pub fn rate_key(self) -> Option<Self> {
        match self {
            Self::SqlCap => Some(Self::SqlRate),
            Self::ClosureCap => Some(Self::ClosureRate),
            _ => None,
        }
    }
}

/// A stored override for one setting key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingRecord {
    pub key: SettingKey,
    pub value: i64,
    pub description: String,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

/// Admin-facing view of one setting: stored override merged with its
/// compiled-in default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingView {
    pub key: SettingKey,
    pub value: i64,
    pub default: i64,
    pub description: String,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Effective incentive configuration: compiled-in defaults, overridable per
/// deployment from the environment, then per key from the settings store.
/// Resolved once per engine operation and passed in explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub sql_rate: i64,
    pub sql_cap: i64,
    pub closure_rate: i64,
    pub closure_cap: i64,
    pub po_conversion_bonus: i64,
    pub sql_milestone_threshold: i64,
    pub sql_milestone_bonus: i64,
    pub po_milestone_threshold: i64,
    pub po_milestone_bonus: i64,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            sql_rate: 300,
            sql_cap: 500,
            closure_rate: 1_000,
            closure_cap: 1_000,
            po_conversion_bonus: 200,
            sql_milestone_threshold: 10,
            sql_milestone_bonus: 10_000,
            po_milestone_threshold: 25,
            po_milestone_bonus: 50_000,
        }
    }
}

impl EffectiveConfig {
    pub fn get(&self, key: SettingKey) -> i64 {
        match key {
            SettingKey::SqlRate => self.sql_rate,
            SettingKey::SqlCap => self.sql_cap,
            SettingKey::ClosureRate => self.closure_rate,
            SettingKey::ClosureCap => self.closure_cap,
            SettingKey::PoConversionBonus => self.po_conversion_bonus,
            SettingKey::SqlMilestoneThreshold => self.sql_milestone_threshold,
            SettingKey::SqlMilestoneBonus => self.sql_milestone_bonus,
            SettingKey::PoMilestoneThreshold => self.po_milestone_threshold,
            SettingKey::PoMilestoneBonus => self.po_milestone_bonus,
        }
    }

    pub fn set(&mut self, key: SettingKey, value: i64) {
        match key {
            SettingKey::SqlRate => self.sql_rate = value,
            SettingKey::SqlCap => self.sql_cap = value,
            SettingKey::ClosureRate => self.closure_rate = value,
            SettingKey::ClosureCap => self.closure_cap = value,
            SettingKey::PoConversionBonus => self.po_conversion_bonus = value,
            SettingKey::SqlMilestoneThreshold => self.sql_milestone_threshold = value,
            SettingKey::SqlMilestoneBonus => self.sql_milestone_bonus = value,
            SettingKey::PoMilestoneThreshold => self.po_milestone_threshold = value,
            SettingKey::PoMilestoneBonus => self.po_milestone_bonus = value,
        }
    }

    pub fn capped_sql_amount(&self) -> i64 {
        self.sql_rate.min(self.sql_cap)
    }

    pub fn capped_closure_amount(&self) -> i64 {
        self.closure_rate.min(self.closure_cap)
    }
}
