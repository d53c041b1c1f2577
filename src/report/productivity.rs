use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::{ActivityEvent, TimestampField};
use crate::metrics::rolling::{close_samples, first_response_samples, rolling_series};
use crate::metrics::snapshot::backlog_series;
use crate::metrics::trend::trend;
use crate::metrics::types::{GranularScalar, GranularSeries, MetricValue};
use crate::metrics::window::{count_in, count_series};
use crate::query::period::{generate, latest_and_previous, Granularity};

/// `issuesAnalysis.json` and `pullRequestAnalysis.json` share this shape.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductivityReport {
    pub opened_last: GranularScalar,
    pub opened_prev: GranularScalar,
    pub closed_last: GranularScalar,
    pub closed_prev: GranularScalar,
    pub trend_opened: GranularScalar,
    pub trend_closed: GranularScalar,
    pub backlog: GranularSeries,
    pub open_by: GranularSeries,
    pub close_by: GranularSeries,
    pub time_to_answer: GranularSeries,
    pub time_to_close: GranularSeries,
}

/// Opening, closing and response metrics for one kind of tracked item
/// (issues or pull requests) and the comments made on them.
pub fn compute(
    items: &[ActivityEvent],
    comments: &[ActivityEvent],
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<ProductivityReport> {
    let mut report = ProductivityReport::default();

    let answers = first_response_samples(items, comments);
    let closes = close_samples(items);
    log::debug!(
        "{} first-response and {} close samples from {} items",
        answers.len(),
        closes.len(),
        items.len()
    );

    for g in Granularity::ALL {
        let (last, prev) = latest_and_previous(g, now);
        let opened_last = count_in(items, &last, TimestampField::CreatedAt);
        let opened_prev = count_in(items, &prev, TimestampField::CreatedAt);
        let closed_last = count_in(items, &last, TimestampField::ClosedAt);
        let closed_prev = count_in(items, &prev, TimestampField::ClosedAt);

        report.opened_last.insert(g, MetricValue::count(opened_last));
        report.opened_prev.insert(g, MetricValue::count(opened_prev));
        report.closed_last.insert(g, MetricValue::count(closed_last));
        report.closed_prev.insert(g, MetricValue::count(closed_prev));
        report.trend_opened.insert(
            g,
            MetricValue::float(trend(opened_last as f64, opened_prev as f64)),
        );
        report.trend_closed.insert(
            g,
            MetricValue::float(trend(closed_last as f64, closed_prev as f64)),
        );

        let periods = generate(g, config.window_count, 0, now)?;
        report.backlog.insert(g, backlog_series(items, &periods));
        report
            .open_by
            .insert(g, count_series(items, &periods, TimestampField::CreatedAt));
        report
            .close_by
            .insert(g, count_series(items, &periods, TimestampField::ClosedAt));
        report.time_to_answer.insert(g, rolling_series(&answers, &periods));
        report.time_to_close.insert(g, rolling_series(&closes, &periods));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    /// Saturday 2025-03-15, midday.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn config() -> EngineConfig {
        EngineConfig {
            window_count: 4,
            ..Default::default()
        }
    }

    fn issues() -> Vec<ActivityEvent> {
        vec![
            // Opened the day before yesterday, closed yesterday.
            ActivityEvent::new("ann", at(13, 9)).with_number(1).with_closed_at(at(14, 9)),
            ActivityEvent::new("bob", at(14, 8)).with_number(2),
            ActivityEvent::new("cat", at(14, 20)).with_number(3),
        ]
    }

    fn comments() -> Vec<ActivityEvent> {
        vec![
            ActivityEvent::new("ann", at(13, 10)).with_parent(1),
            ActivityEvent::new("dan", at(13, 15)).with_parent(1),
            ActivityEvent::new("ann", at(14, 10)).with_parent(2),
        ]
    }

    #[test]
    fn test_last_and_previous_counts() {
        let report = compute(&issues(), &comments(), &config(), now()).unwrap();
        assert_eq!(report.opened_last[&Granularity::Day], MetricValue::Int(2));
        assert_eq!(report.opened_prev[&Granularity::Day], MetricValue::Int(1));
        assert_eq!(report.closed_last[&Granularity::Day], MetricValue::Int(1));
        assert_eq!(report.closed_prev[&Granularity::Day], MetricValue::Int(0));
        assert_eq!(report.trend_opened[&Granularity::Day], MetricValue::Float(1.0));
        // Nothing closed the day before: reads as -1 even though closings went up.
        assert_eq!(report.trend_closed[&Granularity::Day], MetricValue::Float(-1.0));

        // The current week is still running; the last full week saw nothing.
        assert_eq!(report.opened_last[&Granularity::Week], MetricValue::Int(0));
    }

    #[test]
    fn test_series_shapes_and_labels() {
        let report = compute(&issues(), &comments(), &config(), now()).unwrap();
        for series in [&report.backlog, &report.open_by, &report.time_to_close] {
            assert_eq!(series.len(), 3);
            for g in Granularity::ALL {
                assert_eq!(series[&g].len(), 4);
            }
        }
        assert_eq!(
            report.backlog[&Granularity::Day].labels(),
            vec!["2025-03-11", "2025-03-12", "2025-03-13", "2025-03-14"]
        );
        assert_eq!(
            report.backlog[&Granularity::Day].values(),
            vec![
                MetricValue::Int(0),
                MetricValue::Int(0),
                MetricValue::Int(1),
                MetricValue::Int(2),
            ]
        );
        assert_eq!(
            report.close_by[&Granularity::Day].values().last(),
            Some(&MetricValue::Int(1))
        );
    }

    #[test]
    fn test_response_and_close_times() {
        let report = compute(&issues(), &comments(), &config(), now()).unwrap();
        let answer = report.time_to_answer[&Granularity::Day].values();
        // Issue 1 was answered by dan after six hours; the author's own
        // comment an hour in does not count.
        assert_eq!(answer[2], MetricValue::Float(6.0));
        assert_eq!(answer[3], MetricValue::Float(2.0));
        assert_eq!(answer[0], MetricValue::Int(0));

        let close = report.time_to_close[&Granularity::Day].values();
        assert_eq!(close[3], MetricValue::Float(24.0));

        // Month values are in days, and March has not finished yet.
        let monthly = report.time_to_close[&Granularity::Month].values();
        assert_eq!(monthly.last(), Some(&MetricValue::Int(0)));
    }

    #[test]
    fn test_empty_inputs_degrade_without_error() {
        let report = compute(&[], &[], &config(), now() + Duration::days(1)).unwrap();
        for g in Granularity::ALL {
            assert_eq!(report.trend_opened[&g], MetricValue::Float(-1.0));
            assert!(report.time_to_answer[&g]
                .values()
                .iter()
                .all(|v| *v == MetricValue::Int(0)));
        }
    }
}
