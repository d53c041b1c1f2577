//! Metric families and their on-disk layout.
//!
//! Each family is computed from one repository's [`RepoEvents`] and written
//! to `<out_dir>/<org>/<repo>/<file>` as pretty-printed JSON.

pub mod engagement;
pub mod newcomers;
pub mod productivity;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::RepoEvents;

pub use engagement::EngagementReport;
pub use newcomers::NewcomerReport;
pub use productivity::ProductivityReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricFamily {
    Newcomers,
    Engagement,
    Issues,
    Pulls,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 4] = [
        MetricFamily::Newcomers,
        MetricFamily::Engagement,
        MetricFamily::Issues,
        MetricFamily::Pulls,
    ];

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "newcomers" => Ok(MetricFamily::Newcomers),
            "engagement" => Ok(MetricFamily::Engagement),
            "issues" => Ok(MetricFamily::Issues),
            "pulls" | "pull_requests" => Ok(MetricFamily::Pulls),
            _ => Err(Error::Other(format!(
                "unknown metric family: {s} (expected newcomers, engagement, issues or pulls)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricFamily::Newcomers => "newcomers",
            MetricFamily::Engagement => "engagement",
            MetricFamily::Issues => "issues",
            MetricFamily::Pulls => "pulls",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            MetricFamily::Newcomers => "newcomerAnalysis.json",
            MetricFamily::Engagement => "engagementAnalysis.json",
            MetricFamily::Issues => "issuesAnalysis.json",
            MetricFamily::Pulls => "pullRequestAnalysis.json",
        }
    }
}

impl FromStr for MetricFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MetricFamily::parse(s)
    }
}

impl std::fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A computed family document.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Report {
    Newcomers(NewcomerReport),
    Engagement(EngagementReport),
    Productivity(ProductivityReport),
}

/// Compute one family for a repository as of `now`.
pub fn compute(
    family: MetricFamily,
    events: &RepoEvents,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<Report> {
    let report = match family {
        MetricFamily::Newcomers => {
            Report::Newcomers(newcomers::compute(events.pulls.as_slice(), config, now)?)
        }
        MetricFamily::Engagement => Report::Engagement(engagement::compute(events, config, now)?),
        MetricFamily::Issues => Report::Productivity(productivity::compute(
            events.issues.as_slice(),
            events.issue_comments.as_slice(),
            config,
            now,
        )?),
        MetricFamily::Pulls => Report::Productivity(productivity::compute(
            events.pulls.as_slice(),
            events.pull_comments.as_slice(),
            config,
            now,
        )?),
    };
    Ok(report)
}

/// Where a family's document lives for one repository.
pub fn report_path(out_dir: &Path, org: &str, repo: &str, family: MetricFamily) -> PathBuf {
    out_dir.join(org).join(repo).join(family.file_name())
}

/// Write `report` as pretty JSON, creating directories as needed.
pub fn write_report(
    out_dir: &Path,
    org: &str,
    repo: &str,
    family: MetricFamily,
    report: &Report,
) -> Result<PathBuf> {
    let path = report_path(out_dir, org, repo, family);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, text)?;
    log::info!("Wrote {family} metrics to {}", path.display());
    Ok(path)
}
