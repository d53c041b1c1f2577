use chrono::{DateTime, Utc};

use crate::events::ActivityEvent;
use crate::metrics::types::{MetricSeries, MetricValue, Point};
use crate::query::period::Period;

/// Whether an item was open at `as_of`: created at or before it and not yet
/// closed. A missing `closed_at` means the item is still open.
pub fn is_open_at(event: &ActivityEvent, as_of: DateTime<Utc>) -> bool {
    let created = event.created_at.is_some_and(|c| c <= as_of);
    let not_closed = event.closed_at.is_none_or(|c| c > as_of);
    created && not_closed
}

/// Number of items open at the instant `as_of`.
pub fn backlog_size(events: &[ActivityEvent], as_of: DateTime<Utc>) -> usize {
    events.iter().filter(|e| is_open_at(e, as_of)).count()
}

/// Backlog evaluated at the last instant of each period.
pub fn backlog_series(events: &[ActivityEvent], periods: &[Period]) -> MetricSeries {
    periods
        .iter()
        .map(|p| Point {
            x: p.label(),
            y: MetricValue::count(backlog_size(events, p.last_instant())),
        })
        .collect()
}
