use std::env;

use thiserror::Error;

use crate::roster::{Roster, RosterError};
use crate::settings::types::EffectiveConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub service_name: String,
    pub db_url: Option<String>,
    /// Deployment-level incentive defaults. Stored settings overrides are
    /// merged over these at resolution time.
    pub incentive_defaults: EffectiveConfig,
    pub roster: Roster,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid incentive policy config: {0}")]
    InvalidIncentivePolicyConfig(String),
    #[error("invalid LEDGER_ROSTER: {0}")]
    InvalidRoster(#[from] RosterError),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let service_name =
            env::var("LEDGER_SERVICE_NAME").unwrap_or_else(|_| "ledger".to_string());
        let db_url = env::var("DB_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let incentive_defaults = parse_incentive_defaults_from_env(|key| env::var(key).ok())?;
        let roster = Roster::from_spec(env::var("LEDGER_ROSTER").unwrap_or_default().as_str())?;

        Ok(Self {
            service_name,
            db_url,
            incentive_defaults,
            roster,
        })
    }
}

fn parse_incentive_defaults_from_env(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<EffectiveConfig, ConfigError> {
    let defaults = EffectiveConfig::default();

    let sql_cap = parse_i64_env_lookup(&lookup, "LEDGER_SQL_CAP", defaults.sql_cap, 0, i64::MAX)?;
    let sql_rate =
        parse_i64_env_lookup(&lookup, "LEDGER_SQL_RATE", defaults.sql_rate, 0, sql_cap)?;
    let closure_cap = parse_i64_env_lookup(
        &lookup,
        "LEDGER_CLOSURE_CAP",
        defaults.closure_cap,
        0,
        i64::MAX,
    )?;
    let closure_rate = parse_i64_env_lookup(
        &lookup,
        "LEDGER_CLOSURE_RATE",
        defaults.closure_rate,
        0,
        closure_cap,
    )?;
    let po_conversion_bonus = parse_i64_env_lookup(
        &lookup,
        "LEDGER_PO_CONVERSION_BONUS",
        defaults.po_conversion_bonus,
        0,
        i64::MAX,
    )?;
    let sql_milestone_threshold = parse_i64_env_lookup(
        &lookup,
        "LEDGER_SQL_MILESTONE_THRESHOLD",
        defaults.sql_milestone_threshold,
        1,
        i64::MAX,
    )?;
    let sql_milestone_bonus = parse_i64_env_lookup(
        &lookup,
        "LEDGER_SQL_MILESTONE_BONUS",
        defaults.sql_milestone_bonus,
        0,
        i64::MAX,
    )?;
    let po_milestone_threshold = parse_i64_env_lookup(
        &lookup,
        "LEDGER_PO_MILESTONE_THRESHOLD",
        defaults.po_milestone_threshold,
        1,
        i64::MAX,
    )?;
    let po_milestone_bonus = parse_i64_env_lookup(
        &lookup,
        "LEDGER_PO_MILESTONE_BONUS",
        defaults.po_milestone_bonus,
        0,
        i64::MAX,
    )?;

    Ok(EffectiveConfig {
        sql_rate,
        sql_cap,
        closure_rate,
        closure_cap,
        po_conversion_bonus,
        sql_milestone_threshold,
        sql_milestone_bonus,
        po_milestone_threshold,
        po_milestone_bonus,
    })
}

fn parse_i64_env_lookup(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: i64,
    min: i64,
    max: i64,
) -> Result<i64, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|error| {
                ConfigError::InvalidIncentivePolicyConfig(format!("{key}: {error}"))
            })
            .map(|value| value.clamp(min, max)),
        None => Ok(default),
    }
}
