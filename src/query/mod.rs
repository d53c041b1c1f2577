pub mod period;

pub use period::{generate, latest_and_previous, Granularity, Period};
