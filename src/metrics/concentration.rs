use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::events::ActivityEvent;

/// Contributions per non-empty actor with `created_at` in `[start, end)`.
pub fn contributions_by_actor(
    events: &[ActivityEvent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> HashMap<&str, u64> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for event in events.iter().filter(|e| e.has_actor()) {
        if event.created_at.is_some_and(|t| t >= start && t < end) {
            *counts.entry(event.actor.as_str()).or_default() += 1;
        }
    }
    counts
}

/// Gini coefficient of contributions inside `[start, end)`.
///
/// Fewer than two actors, or no contributions at all, is `0`: there is
/// nothing to compare.
pub fn gini(events: &[ActivityEvent], start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let counts: Vec<u64> = contributions_by_actor(events, start, end).into_values().collect();
    gini_of_counts(counts)
}

/// Standard discrete Gini over per-actor counts, ranks 1-indexed ascending.
pub fn gini_of_counts(mut counts: Vec<u64>) -> f64 {
    let n = counts.len();
    let total: u64 = counts.iter().sum();
    if n < 2 || total == 0 {
        return 0.0;
    }

    counts.sort_unstable();
    let weighted: f64 = counts
        .iter()
        .enumerate()
        .map(|(i, c)| (i + 1) as f64 * *c as f64)
        .sum();
    let n = n as f64;
    let total = total as f64;
    (2.0 * weighted - (n + 1.0) * total) / (n * total)
}
