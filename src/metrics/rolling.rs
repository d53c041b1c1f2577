use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::events::ActivityEvent;
use crate::metrics::trend::round_to;
use crate::metrics::types::{MetricSeries, MetricValue, Point};
use crate::query::period::{Granularity, Period};

/// A duration observed at an instant, e.g. the hours an issue waited for its
/// first answer, stamped with the time of that answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationSample {
    pub at: DateTime<Utc>,
    pub hours: f64,
}

impl DurationSample {
    /// Sample spanning `from..to`, or `None` when `to` precedes `from`.
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<Self> {
        let span = to - from;
        if span < Duration::zero() {
            log::debug!("Dropping negative duration sample {from} -> {to}");
            return None;
        }
        Some(Self {
            at: to,
            hours: span.num_milliseconds() as f64 / 3_600_000.0,
        })
    }
}

/// Time from creation to the first comment by someone other than the author.
/// Comments are matched to items on `parent_number == number`.
pub fn first_response_samples(items: &[ActivityEvent], comments: &[ActivityEvent]) -> Vec<DurationSample> {
    let mut by_parent: HashMap<i64, Vec<&ActivityEvent>> = HashMap::new();
    for comment in comments {
        if let (Some(parent), Some(_)) = (comment.parent_number, comment.created_at) {
            by_parent.entry(parent).or_default().push(comment);
        }
    }

    items
        .iter()
        .filter_map(|item| {
            let created = item.created_at?;
            let thread = by_parent.get(&item.number?)?;
            let answered = thread
                .iter()
                .filter(|c| c.actor != item.actor)
                .filter_map(|c| c.created_at)
                .min()?;
            DurationSample::between(created, answered)
        })
        .collect()
}

/// Time from creation to close, stamped at `closed_at`.
pub fn close_samples(items: &[ActivityEvent]) -> Vec<DurationSample> {
    items
        .iter()
        .filter_map(|item| DurationSample::between(item.created_at?, item.closed_at?))
        .collect()
}

/// Mean duration per period, evaluated at each period's last instant.
///
/// A sample counts when its instant falls in `(sub_start, point]`, where the
/// sub-window is one day or one week back for those granularities. Months
/// run from the previous point; the first month reaches back to just before
/// the earliest sample. Days average hours, weeks and months average days.
/// Periods without samples are `None`.
pub fn rolling_average(samples: &[DurationSample], periods: &[Period]) -> Vec<Option<f64>> {
    if samples.is_empty() {
        log::warn!("No duration samples; every window is empty");
    }
    let earliest = samples.iter().map(|s| s.at).min();

    let mut previous_point: Option<DateTime<Utc>> = None;
    periods
        .iter()
        .map(|period| {
            let point = period.last_instant();
            let sub_start = match period.granularity {
                Granularity::Day => point - Duration::days(1),
                Granularity::Week => point - Duration::days(7),
                Granularity::Month => match (previous_point, earliest) {
                    (Some(prev), _) => prev,
                    (None, Some(first)) => first - Duration::seconds(1),
                    (None, None) => point - Duration::days(30),
                },
            };
            previous_point = Some(point);

            let scale = match period.granularity {
                Granularity::Day => 1.0,
                Granularity::Week | Granularity::Month => 24.0,
            };
            let values: Vec<f64> = samples
                .iter()
                .filter(|s| s.at > sub_start && s.at <= point)
                .map(|s| s.hours / scale)
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        })
        .collect()
}

/// Label rolling values; a missing value is written as `0`, not `null`.
pub fn render_rolling(periods: &[Period], values: &[Option<f64>]) -> MetricSeries {
    periods
        .iter()
        .zip(values)
        .map(|(p, v)| Point {
            x: p.label(),
            y: match v {
                Some(v) => MetricValue::float(round_to(*v, 2)),
                None => MetricValue::Int(0),
            },
        })
        .collect()
}

pub fn rolling_series(samples: &[DurationSample], periods: &[Period]) -> MetricSeries {
    render_rolling(periods, &rolling_average(samples, periods))
}
