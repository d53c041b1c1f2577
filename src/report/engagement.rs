use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::{ActivityEvent, RepoEvents, TimestampField};
use crate::metrics::concentration::gini;
use crate::metrics::trend::{round_to, safe_divide};
use crate::metrics::types::{GranularSeries, MetricSeries, MetricValue, Point};
use crate::metrics::window::{aggregate, distinct_actors, window_slice};
use crate::query::period::{generate, Granularity, Period};

/// `engagementAnalysis.json`.
#[derive(Debug, Clone, Serialize)]
pub struct EngagementReport {
    pub active_chat_participation_rate: GranularSeries,
    pub committer_churn_rate: MetricValue,
    pub committer_concentration_gini: GranularSeries,
    pub contributor_counts_yoy: MetricSeries,
    pub occasional_contributors: GranularSeries,
}

pub fn compute(events: &RepoEvents, config: &EngineConfig, now: DateTime<Utc>) -> Result<EngagementReport> {
    // Repositories mirrored without commit history still have pull requests.
    let commits = if events.commits.is_empty() {
        log::info!("No commits loaded; using pull requests as commit activity");
        events.pulls.as_slice()
    } else {
        events.commits.as_slice()
    };
    let pulls = events.pulls.as_slice();
    let comments = events.all_comments();

    let mut report = EngagementReport {
        active_chat_participation_rate: GranularSeries::new(),
        committer_churn_rate: churn_rate(commits, Duration::days(config.churn_days as i64), now),
        committer_concentration_gini: GranularSeries::new(),
        contributor_counts_yoy: contributor_counts_yoy(commits),
        occasional_contributors: GranularSeries::new(),
    };

    for g in Granularity::ALL {
        let periods = generate(g, config.window_count, 0, now)?;
        report
            .active_chat_participation_rate
            .insert(g, chat_participation(&comments, commits, &periods));
        report
            .committer_concentration_gini
            .insert(g, concentration(commits, &periods));
        report.occasional_contributors.insert(
            g,
            occasional_contributors(
                pulls,
                &periods,
                config.occasional_threshold,
                Duration::days(config.occasional_lookback_days as i64),
            ),
        );
    }

    log::info!(
        "Computed engagement metrics over {} commits and {} comments",
        commits.len(),
        comments.len()
    );
    Ok(report)
}

/// Percent of the people active in a window (committing or commenting) who
/// commented. Nobody active is `null`.
pub fn chat_participation(
    comments: &[ActivityEvent],
    commits: &[ActivityEvent],
    periods: &[Period],
) -> MetricSeries {
    aggregate(comments, periods, |period, window_comments| {
        let commenters = distinct_actors(window_comments);
        let committed = window_slice(commits, period, TimestampField::CreatedAt);
        let active: HashSet<&str> = commenters
            .union(&distinct_actors(&committed))
            .copied()
            .collect();
        if active.is_empty() {
            return MetricValue::Null;
        }
        MetricValue::float(safe_divide(
            commenters.len() as f64 * 100.0,
            active.len() as f64,
            2,
        ))
    })
}

/// Percent of the committers seen in `[now - 2·span, now - span)` who made
/// no commit in `[now - span, now)`.
pub fn churn_rate(commits: &[ActivityEvent], span: Duration, now: DateTime<Utc>) -> MetricValue {
    let active_between = |start: DateTime<Utc>, end: DateTime<Utc>| -> HashSet<&str> {
        commits
            .iter()
            .filter(|e| e.has_actor() && e.created_at.is_some_and(|t| t >= start && t < end))
            .map(|e| e.actor.as_str())
            .collect()
    };
    let earlier = active_between(now - span - span, now - span);
    let recent = active_between(now - span, now);
    let churned = earlier.difference(&recent).count();
    MetricValue::float(safe_divide(churned as f64 * 100.0, earlier.len() as f64, 2))
}

pub fn concentration(commits: &[ActivityEvent], periods: &[Period]) -> MetricSeries {
    aggregate(commits, periods, |period, _| {
        let g = gini(commits, period.start_instant(), period.end_instant());
        MetricValue::float(round_to(g, 4))
    })
}

/// Distinct committers per calendar year, oldest year first.
pub fn contributor_counts_yoy(commits: &[ActivityEvent]) -> MetricSeries {
    let mut by_year: BTreeMap<i32, HashSet<&str>> = BTreeMap::new();
    for commit in commits.iter().filter(|e| e.has_actor()) {
        if let Some(created) = commit.created_at {
            by_year
                .entry(created.year())
                .or_default()
                .insert(commit.actor.as_str());
        }
    }
    by_year
        .into_iter()
        .map(|(year, actors)| Point {
            x: year.to_string(),
            y: MetricValue::count(actors.len()),
        })
        .collect()
}

/// Contributors with a pull request in the window who opened fewer than
/// `threshold` pull requests over the `lookback` ending at the window's end.
pub fn occasional_contributors(
    pulls: &[ActivityEvent],
    periods: &[Period],
    threshold: usize,
    lookback: Duration,
) -> MetricSeries {
    aggregate(pulls, periods, |period, window| {
        let active = distinct_actors(window);
        if active.is_empty() {
            return MetricValue::Int(0);
        }
        let end = period.end_instant();
        let start = end - lookback;
        let mut trailing: HashMap<&str, usize> = HashMap::new();
        for pr in pulls {
            if active.contains(pr.actor.as_str()) && pr.created_at.is_some_and(|t| t >= start && t < end) {
                *trailing.entry(pr.actor.as_str()).or_default() += 1;
            }
        }
        MetricValue::count(trailing.values().filter(|n| **n < threshold).count())
    })
}
