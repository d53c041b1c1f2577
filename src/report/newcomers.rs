use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::ActivityEvent;
use crate::metrics::cohort::{
    median_time_to_second_contribution, newcomers_count, onboarding_success, retention,
};
use crate::metrics::types::GranularSeries;
use crate::query::period::{generate, Granularity};

/// `newcomerAnalysis.json`. Every metric reads pull requests only.
#[derive(Debug, Clone, Serialize)]
pub struct NewcomerReport {
    pub newcomers_count: GranularSeries,
    /// Week and month only: daily cohorts are too small to be meaningful.
    pub retention_90d: GranularSeries,
    pub onboarding_success: GranularSeries,
    pub median_time_to_second_contribution: GranularSeries,
}

pub fn compute(pulls: &[ActivityEvent], config: &EngineConfig, now: DateTime<Utc>) -> Result<NewcomerReport> {
    let mut report = NewcomerReport {
        newcomers_count: GranularSeries::new(),
        retention_90d: GranularSeries::new(),
        onboarding_success: GranularSeries::new(),
        median_time_to_second_contribution: GranularSeries::new(),
    };

    for g in Granularity::ALL {
        let periods = generate(g, config.window_count, 0, now)?;
        report.newcomers_count.insert(g, newcomers_count(pulls, &periods));
        report.onboarding_success.insert(g, onboarding_success(pulls, &periods));
        report
            .median_time_to_second_contribution
            .insert(g, median_time_to_second_contribution(pulls, &periods));
    }

    for g in [Granularity::Week, Granularity::Month] {
        let periods = generate(g, config.window_count, config.retention_cutoff_days, now)?;
        report
            .retention_90d
            .insert(g, retention(pulls, &periods, config.retention_lookahead()));
    }

    log::info!("Computed newcomer metrics over {} pull requests", pulls.len());
    Ok(report)
}
