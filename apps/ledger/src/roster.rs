use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ledger::types::IncentiveType;

/// Incentive role of a roster member. Eligibility for each incentive type is
/// derived from the role, not from inline name comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncentiveRole {
    Prospector,
    Closer,
    Admin,
}

impl IncentiveRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prospector => "prospector",
            Self::Closer => "closer",
            Self::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "prospector" => Some(Self::Prospector),
            "closer" => Some(Self::Closer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn allows(self, incentive_type: IncentiveType) -> bool {
        match self {
            Self::Prospector => matches!(
                incentive_type,
                IncentiveType::Sql | IncentiveType::PoConversion
            ),
            Self::Closer => matches!(
                incentive_type,
                IncentiveType::Closure
                    | IncentiveType::BonusSqlMilestone
                    | IncentiveType::BonusPoMilestone
            ),
            Self::Admin => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterMember {
    pub user_id: String,
    pub display_name: String,
    pub role: IncentiveRole,
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("invalid roster entry, expected name:user_id:role, got: {0}")]
    InvalidEntry(String),
    #[error("invalid roster role: {0}")]
    InvalidRole(String),
    #[error("duplicate roster name: {0}")]
    DuplicateName(String),
}

/// Eligibility roster for incentive beneficiaries. Consulted (never mutated)
/// by the engine before any ledger write; resolved by name by the sync job.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    by_name: HashMap<String, RosterMember>,
    by_id: HashMap<String, RosterMember>,
}

impl Roster {
    /// Parses a compact roster spec: `name:user_id:role` entries separated by
    /// commas, e.g. `Aparna:u-aparna:prospector,Gauri:u-gauri:closer`.
    pub fn from_spec(spec: &str) -> Result<Self, RosterError> {
        let mut roster = Self::default();
        for token in spec.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let mut parts = token.splitn(3, ':');
            let (name, user_id, role_raw) = match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(user_id), Some(role)) => (name.trim(), user_id.trim(), role),
                _ => return Err(RosterError::InvalidEntry(token.to_string())),
            };
            if name.is_empty() || user_id.is_empty() {
                return Err(RosterError::InvalidEntry(token.to_string()));
            }
            let role = IncentiveRole::parse(role_raw)
                .ok_or_else(|| RosterError::InvalidRole(role_raw.trim().to_string()))?;
            let member = RosterMember {
                user_id: user_id.to_string(),
                display_name: name.to_string(),
                role,
            };
            if roster
                .by_name
                .insert(name.to_ascii_lowercase(), member.clone())
                .is_some()
            {
                return Err(RosterError::DuplicateName(name.to_string()));
            }
            roster.by_id.insert(member.user_id.clone(), member);
        }
        Ok(roster)
    }

    pub fn member_by_name(&self, name: &str) -> Option<&RosterMember> {
        self.by_name.get(name.trim().to_ascii_lowercase().as_str())
    }

    pub fn member_by_id(&self, user_id: &str) -> Option<&RosterMember> {
        self.by_id.get(user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }
}
