//! Windowed metric primitives over in-memory event tables.
//!
//! Everything here is a pure function of `(events, periods)`. Window bounds
//! come from [`crate::query::period`]; "now" is never read here.

pub mod cohort;
pub mod concentration;
pub mod rolling;
pub mod snapshot;
pub mod trend;
pub mod types;
pub mod window;

pub use cohort::{
    first_occurrence, median_time_to_second_contribution, newcomers_count, onboarding_success,
    retention,
};
pub use concentration::{contributions_by_actor, gini};
pub use rolling::{
    close_samples, first_response_samples, render_rolling, rolling_average, rolling_series,
    DurationSample,
};
pub use snapshot::{backlog_series, backlog_size};
pub use trend::{round_to, safe_divide, trend};
pub use types::*;
pub use window::{aggregate, aggregate_on, count_in, count_series};
