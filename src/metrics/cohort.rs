use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::events::ActivityEvent;
use crate::metrics::trend::round_to;
use crate::metrics::types::{MetricSeries, MetricValue, Point};
use crate::query::period::Period;

/// Each actor's activity timestamps, ascending. Rows without an actor or a
/// usable `created_at` are skipped.
pub fn timelines(events: &[ActivityEvent]) -> HashMap<&str, Vec<DateTime<Utc>>> {
    let mut by_actor: HashMap<&str, Vec<DateTime<Utc>>> = HashMap::new();
    for event in events {
        let Some(created) = event.created_at else {
            continue;
        };
        if !event.has_actor() {
            continue;
        }
        by_actor.entry(event.actor.as_str()).or_default().push(created);
    }
    for stamps in by_actor.values_mut() {
        stamps.sort();
    }
    by_actor
}

/// Earliest `created_at` per actor.
pub fn first_occurrence(events: &[ActivityEvent]) -> HashMap<&str, DateTime<Utc>> {
    let mut first: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for event in events {
        let Some(created) = event.created_at else {
            continue;
        };
        if !event.has_actor() {
            continue;
        }
        first
            .entry(event.actor.as_str())
            .and_modify(|t| *t = (*t).min(created))
            .or_insert(created);
    }
    first
}

/// Actors whose first appearance falls inside `period`.
pub fn cohort<'a>(first_seen: &HashMap<&'a str, DateTime<Utc>>, period: &Period) -> Vec<&'a str> {
    let mut members: Vec<&str> = first_seen
        .iter()
        .filter(|(_, t)| period.contains(**t))
        .map(|(actor, _)| *actor)
        .collect();
    members.sort_unstable();
    members
}

fn per_period<F>(periods: &[Period], mut value: F) -> MetricSeries
where
    F: FnMut(&Period) -> MetricValue,
{
    periods
        .iter()
        .map(|p| Point {
            x: p.label(),
            y: value(p),
        })
        .collect()
}

/// Number of newcomers per window. Zero is a real value here, not "no data".
pub fn newcomers_count(events: &[ActivityEvent], periods: &[Period]) -> MetricSeries {
    let first_seen = first_occurrence(events);
    per_period(periods, |p| MetricValue::count(cohort(&first_seen, p).len()))
}

/// Percent of each window's cohort still active `lookahead` after the window
/// started. The outcome check spans the actor's whole history; an empty
/// cohort is `null`.
pub fn retention(events: &[ActivityEvent], periods: &[Period], lookahead: Duration) -> MetricSeries {
    let history = timelines(events);
    let first_seen = first_occurrence(events);

    per_period(periods, |p| {
        let members = cohort(&first_seen, p);
        if members.is_empty() {
            return MetricValue::Null;
        }
        let threshold = p.start_instant() + lookahead;
        let retained = members
            .iter()
            .filter(|actor| {
                history
                    .get(*actor)
                    .and_then(|stamps| stamps.last())
                    .is_some_and(|last| *last >= threshold)
            })
            .count();
        MetricValue::float(round_to(percent(retained, members.len()), 2))
    })
}

/// Percent of actors whose first pull request landed in the window and was
/// eventually merged.
pub fn onboarding_success(pulls: &[ActivityEvent], periods: &[Period]) -> MetricSeries {
    let mut first_pull: HashMap<&str, &ActivityEvent> = HashMap::new();
    for pr in pulls.iter().filter(|e| e.has_actor()) {
        let Some(created) = pr.created_at else {
            continue;
        };
        first_pull
            .entry(pr.actor.as_str())
            .and_modify(|current| {
                if current.created_at.is_some_and(|c| created < c) {
                    *current = pr;
                }
            })
            .or_insert(pr);
    }

    per_period(periods, |p| {
        let firsts: Vec<&&ActivityEvent> = first_pull
            .values()
            .filter(|pr| p.contains_opt(pr.created_at))
            .collect();
        if firsts.is_empty() {
            return MetricValue::Null;
        }
        let merged = firsts.iter().filter(|pr| pr.merged_at.is_some()).count();
        MetricValue::float(round_to(percent(merged, firsts.len()), 2))
    })
}

/// Median whole days between an actor's first and second event, over actors
/// first seen in the window who have a second event at all. A half-day median
/// is truncated, so gaps of 3 and 6 days report 4.
pub fn median_time_to_second_contribution(
    events: &[ActivityEvent],
    periods: &[Period],
) -> MetricSeries {
    let history = timelines(events);

    per_period(periods, |p| {
        let mut gaps: Vec<i64> = history
            .values()
            .filter(|stamps| stamps.len() >= 2 && p.contains(stamps[0]))
            .map(|stamps| (stamps[1] - stamps[0]).num_days())
            .collect();
        gaps.sort_unstable();
        median(&gaps).map_or(MetricValue::Null, |m| MetricValue::Int(m.trunc() as i64))
    })
}

fn median(sorted: &[i64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    #[allow(clippy::manual_is_multiple_of)]
    let m = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    };
    Some(m)
}

fn percent(part: usize, whole: usize) -> f64 {
    part as f64 * 100.0 / whole as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::period::Granularity;
    use chrono::{NaiveDate, TimeZone};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Day `n` of 2025 (day 1 is January 1st), at 10:00 UTC.
    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap() + Duration::days(n - 1)
    }

    fn daily(first: i64, n: i64) -> Vec<Period> {
        (0..n)
            .map(|i| Period::starting_at(Granularity::Day, d(2025, 1, 1) + Duration::days(first - 1 + i)))
            .collect()
    }

    fn abc() -> Vec<ActivityEvent> {
        vec![
            ActivityEvent::new("A", day(1)),
            ActivityEvent::new("B", day(1)),
            ActivityEvent::new("A", day(3)),
            ActivityEvent::new("C", day(40)),
        ]
    }

    #[test]
    fn test_first_occurrence_takes_earliest() {
        let events = vec![
            ActivityEvent::new("A", day(5)),
            ActivityEvent::new("A", day(2)),
            ActivityEvent::new("", day(1)),
            ActivityEvent {
                actor: "B".into(),
                ..Default::default()
            },
        ];
        let first = first_occurrence(&events);
        assert_eq!(first.len(), 1);
        assert_eq!(first["A"], day(2));
    }

    #[test]
    fn test_newcomers_scenario() {
        let series = newcomers_count(&abc(), &daily(1, 5));
        assert_eq!(
            series.values(),
            vec![
                MetricValue::Int(2),
                MetricValue::Int(0),
                MetricValue::Int(0),
                MetricValue::Int(0),
                MetricValue::Int(0),
            ]
        );
    }

    #[test]
    fn test_cohorts_partition_actors() {
        let periods = daily(1, 60);
        let series = newcomers_count(&abc(), &periods);
        let total: i64 = series
            .values()
            .iter()
            .map(|v| match v {
                MetricValue::Int(n) => *n,
                _ => 0,
            })
            .sum();
        assert_eq!(total, first_occurrence(&abc()).len() as i64);
    }

    #[test]
    fn test_retention_scenario() {
        let week = Period::starting_at(Granularity::Week, d(2025, 1, 6));
        let start = week.start_instant();
        let events = vec![
            ActivityEvent::new("A", start + Duration::hours(1)),
            ActivityEvent::new("B", start + Duration::days(2)),
            ActivityEvent::new("B", start + Duration::days(30)),
            ActivityEvent::new("A", start + Duration::days(95)),
        ];
        let series = retention(&events, &[week, week.next()], Duration::days(90));
        assert_eq!(series.values(), vec![MetricValue::Float(50.0), MetricValue::Null]);
    }

    #[test]
    fn test_retention_boundary_is_inclusive() {
        let week = Period::starting_at(Granularity::Week, d(2025, 1, 6));
        let start = week.start_instant();
        let events = vec![
            ActivityEvent::new("A", start),
            ActivityEvent::new("A", start + Duration::days(90)),
        ];
        let series = retention(&events, &[week], Duration::days(90));
        assert_eq!(series.values(), vec![MetricValue::Float(100.0)]);
    }

    #[test]
    fn test_retention_rounds_to_two_places() {
        let week = Period::starting_at(Granularity::Week, d(2025, 1, 6));
        let start = week.start_instant();
        let events = vec![
            ActivityEvent::new("A", start),
            ActivityEvent::new("B", start),
            ActivityEvent::new("C", start),
            ActivityEvent::new("A", start + Duration::days(100)),
        ];
        let series = retention(&events, &[week], Duration::days(90));
        assert_eq!(series.values(), vec![MetricValue::Float(33.33)]);
    }

    #[test]
    fn test_onboarding_uses_first_pull_only() {
        let events = vec![
            ActivityEvent::new("A", day(1)).with_merged_at(day(2)),
            ActivityEvent::new("B", day(1)),
            // B's later PR merging does not rescue the first one.
            ActivityEvent::new("B", day(4)).with_merged_at(day(5)),
        ];
        let series = onboarding_success(&events, &daily(1, 4));
        assert_eq!(
            series.values(),
            vec![
                MetricValue::Float(50.0),
                MetricValue::Null,
                MetricValue::Null,
                MetricValue::Null,
            ]
        );
    }

    #[test]
    fn test_median_time_to_second_contribution() {
        let events = vec![
            ActivityEvent::new("A", day(1)),
            ActivityEvent::new("A", day(4)),
            ActivityEvent::new("A", day(20)),
            ActivityEvent::new("B", day(1)),
            ActivityEvent::new("B", day(7)),
            // Single contribution: not part of the sample.
            ActivityEvent::new("C", day(1)),
            ActivityEvent::new("D", day(2)),
        ];
        let series = median_time_to_second_contribution(&events, &daily(1, 2));
        // Gaps of 3 and 6 days have a median of 4.5, reported as 4.
        assert_eq!(series.values(), vec![MetricValue::Int(4), MetricValue::Null]);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[4]), Some(4.0));
        assert_eq!(median(&[1, 2, 9]), Some(2.0));
        assert_eq!(median(&[1, 2]), Some(1.5));
    }
}
