use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;

use crate::error::{Error, Result};
use crate::storage::{repository, Database};

/// Keys understood by [`EngineConfig::load`]. Anything else in `app_config`
/// is kept but ignored.
pub const CONFIG_KEYS: [&str; 7] = [
    "window_count",
    "retention_days",
    "retention_cutoff_days",
    "occasional_threshold",
    "occasional_lookback_days",
    "churn_days",
    "output_dir",
];

/// Upper bound for `window_count`.
pub const MAX_WINDOW_COUNT: usize = 10_000;

/// Upper bound for every day-valued setting (about a century).
pub const MAX_DAYS: u32 = 36_500;

/// Tunables for a metric run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Periods generated per granularity.
    pub window_count: usize,
    /// Retention lookahead from the start of a cohort's window.
    pub retention_days: u32,
    /// Cutoff applied when generating retention windows, so the newest
    /// cohorts have had time to come back.
    pub retention_cutoff_days: u32,
    /// PR count below which a contributor is occasional.
    pub occasional_threshold: usize,
    pub occasional_lookback_days: u32,
    pub churn_days: u32,
    pub output_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_count: 30,
            retention_days: 90,
            retention_cutoff_days: 90,
            occasional_threshold: 3,
            occasional_lookback_days: 365,
            churn_days: 90,
            output_dir: PathBuf::from("metrics"),
        }
    }
}

impl EngineConfig {
    /// Read settings from the `app_config` table, falling back to defaults
    /// for missing keys.
    pub async fn load(db: &Database) -> Result<Self> {
        let pairs = db.reader().call(|conn| repository::list_config(conn)).await?;
        Self::from_pairs(&pairs)
    }

    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "window_count" => config.window_count = parse_value(key, value)?,
                "retention_days" => config.retention_days = parse_value(key, value)?,
                "retention_cutoff_days" => config.retention_cutoff_days = parse_value(key, value)?,
                "occasional_threshold" => config.occasional_threshold = parse_value(key, value)?,
                "occasional_lookback_days" => {
                    config.occasional_lookback_days = parse_value(key, value)?
                }
                "churn_days" => config.churn_days = parse_value(key, value)?,
                "output_dir" => config.output_dir = PathBuf::from(value),
                _ => {}
            }
        }
        if config.window_count == 0 || config.window_count > MAX_WINDOW_COUNT {
            return Err(Error::Config(format!(
                "window_count must be between 1 and {MAX_WINDOW_COUNT}"
            )));
        }
        for (key, days) in [
            ("retention_days", config.retention_days),
            ("retention_cutoff_days", config.retention_cutoff_days),
            ("occasional_lookback_days", config.occasional_lookback_days),
            ("churn_days", config.churn_days),
        ] {
            if days > MAX_DAYS {
                return Err(Error::Config(format!("{key} must be at most {MAX_DAYS}")));
            }
        }
        Ok(config)
    }

    pub fn retention_lookahead(&self) -> Duration {
        Duration::days(self.retention_days as i64)
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {key}: {value:?}")))
}
