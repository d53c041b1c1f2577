use std::collections::HashSet;

use crate::events::{ActivityEvent, TimestampField};
use crate::metrics::types::{MetricSeries, MetricValue, Point};
use crate::query::period::Period;

/// Evaluate `reducer` once per period over the events created inside it.
///
/// Every period yields a point, including empty ones; what an empty window
/// is worth is the reducer's decision. Output order follows `periods`.
pub fn aggregate<F>(events: &[ActivityEvent], periods: &[Period], reducer: F) -> MetricSeries
where
    F: FnMut(&Period, &[&ActivityEvent]) -> MetricValue,
{
    aggregate_on(events, periods, TimestampField::CreatedAt, reducer)
}

/// Like [`aggregate`] but windows on an arbitrary timestamp column.
pub fn aggregate_on<F>(
    events: &[ActivityEvent],
    periods: &[Period],
    field: TimestampField,
    mut reducer: F,
) -> MetricSeries
where
    F: FnMut(&Period, &[&ActivityEvent]) -> MetricValue,
{
    periods
        .iter()
        .map(|period| {
            let slice = window_slice(events, period, field);
            Point {
                x: period.label(),
                y: reducer(period, &slice),
            }
        })
        .collect()
}

/// Events whose `field` falls in `[period.start, period.end)`. Rows with a
/// null timestamp never match.
pub fn window_slice<'a>(
    events: &'a [ActivityEvent],
    period: &Period,
    field: TimestampField,
) -> Vec<&'a ActivityEvent> {
    events
        .iter()
        .filter(|e| period.contains_opt(e.timestamp(field)))
        .collect()
}

pub fn count_in(events: &[ActivityEvent], period: &Period, field: TimestampField) -> usize {
    events
        .iter()
        .filter(|e| period.contains_opt(e.timestamp(field)))
        .count()
}

/// Number of events per window on `field`.
pub fn count_series(events: &[ActivityEvent], periods: &[Period], field: TimestampField) -> MetricSeries {
    aggregate_on(events, periods, field, |_, slice| MetricValue::count(slice.len()))
}

/// Distinct non-empty actors in a slice.
pub fn distinct_actors<'a>(events: &[&'a ActivityEvent]) -> HashSet<&'a str> {
    events
        .iter()
        .filter(|e| e.has_actor())
        .map(|e| e.actor.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::period::{Granularity, Period};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
    }

    fn days(first: u32, n: u32) -> Vec<Period> {
        (0..n)
            .map(|i| {
                Period::starting_at(
                    Granularity::Day,
                    NaiveDate::from_ymd_opt(2025, 1, first + i).unwrap(),
                )
            })
            .collect()
    }

    fn table() -> Vec<ActivityEvent> {
        vec![
            ActivityEvent::new("alice", ts(1, 0)),
            ActivityEvent::new("bob", ts(1, 23)),
            ActivityEvent::new("alice", ts(2, 0)).with_closed_at(ts(3, 5)),
            ActivityEvent {
                actor: "ghost".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_counts_are_half_open() {
        let series = count_series(&table(), &days(1, 3), TimestampField::CreatedAt);
        assert_eq!(series.labels(), vec!["2025-01-01", "2025-01-02", "2025-01-03"]);
        assert_eq!(
            series.values(),
            vec![MetricValue::Int(2), MetricValue::Int(1), MetricValue::Int(0)]
        );
    }

    #[test]
    fn test_aggregate_on_closed_at() {
        let series = count_series(&table(), &days(1, 3), TimestampField::ClosedAt);
        assert_eq!(
            series.values(),
            vec![MetricValue::Int(0), MetricValue::Int(0), MetricValue::Int(1)]
        );
    }

    #[test]
    fn test_reducer_runs_for_empty_windows() {
        let mut calls = 0;
        let series = aggregate(&[], &days(1, 4), |_, slice| {
            calls += 1;
            if slice.is_empty() {
                MetricValue::Null
            } else {
                MetricValue::count(slice.len())
            }
        });
        assert_eq!(calls, 4);
        assert_eq!(series.len(), 4);
        assert!(series.values().iter().all(|v| v.is_null()));
    }

    #[test]
    fn test_reducer_sees_its_period() {
        let periods = days(1, 2);
        let series = aggregate(&table(), &periods, |period, slice| {
            assert!(slice.iter().all(|e| period.contains_opt(e.created_at)));
            MetricValue::count(distinct_actors(slice).len())
        });
        assert_eq!(series.values(), vec![MetricValue::Int(2), MetricValue::Int(1)]);
    }

    #[test]
    fn test_null_timestamps_never_match() {
        let events = table();
        let total: usize = days(1, 31)
            .iter()
            .map(|p| count_in(&events, p, TimestampField::CreatedAt))
            .sum();
        assert_eq!(total, 3);
    }
}
