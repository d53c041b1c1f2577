use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::date_util::{first_of_month, monday_of, shift_months, start_of_day};
use crate::error::{Error, Result};

/// Window granularity for metric series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Week, Granularity::Month];

    /// Parse a granularity token. Only `day`, `week` and `month` are accepted;
    /// anything else fails fast rather than defaulting.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            _ => Err(Error::InvalidGranularity(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    /// Convert a cutoff expressed in days into a whole number of periods to
    /// skip. Weeks and months use floor division by 7 and 30; the remainder
    /// is discarded.
    pub fn cutoff_periods(&self, cutoff_days: u32) -> i64 {
        match self {
            Granularity::Day => cutoff_days as i64,
            Granularity::Week => (cutoff_days / 7) as i64,
            Granularity::Month => (cutoff_days / 30) as i64,
        }
    }

    fn label_format(&self) -> &'static str {
        match self {
            Granularity::Day | Granularity::Week => "%Y-%m-%d",
            Granularity::Month => "%Y-%m",
        }
    }

    /// Start of the period of this granularity that contains `today`.
    fn current_start(&self, today: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => today,
            Granularity::Week => monday_of(today),
            Granularity::Month => first_of_month(today),
        }
    }

    /// Move a period start by `delta` whole periods. `None` when the result
    /// leaves chrono's date range.
    fn checked_shift(&self, start: NaiveDate, delta: i64) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.checked_add_signed(Duration::try_days(delta)?),
            Granularity::Week => start.checked_add_signed(Duration::try_weeks(delta)?),
            Granularity::Month => shift_months(start, delta),
        }
    }

    /// One-step shift that clamps at the ends of the date range.
    fn step(&self, start: NaiveDate, forward: bool) -> NaiveDate {
        match (self.checked_shift(start, if forward { 1 } else { -1 }), forward) {
            (Some(d), _) => d,
            (None, true) => NaiveDate::MAX,
            (None, false) => NaiveDate::MIN,
        }
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Granularity::parse(s)
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A half-open window `[start, end)` of one granularity. Dates are UTC
/// calendar days; `start` is inclusive and `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
}

impl Period {
    /// The period of `granularity` beginning at `start`.
    pub fn starting_at(granularity: Granularity, start: NaiveDate) -> Self {
        Self {
            start,
            end: granularity.step(start, true),
            granularity,
        }
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        start_of_day(self.start)
    }

    pub fn end_instant(&self) -> DateTime<Utc> {
        start_of_day(self.end)
    }

    /// The last representable instant inside the period (`end - 1µs`). Used as
    /// the evaluation point for snapshots and rolling averages.
    pub fn last_instant(&self) -> DateTime<Utc> {
        self.end_instant() - Duration::microseconds(1)
    }

    /// Half-open membership test.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start_instant() && ts < self.end_instant()
    }

    /// Same test for an optional timestamp; `None` never matches.
    pub fn contains_opt(&self, ts: Option<DateTime<Utc>>) -> bool {
        ts.is_some_and(|t| self.contains(t))
    }

    /// Series label: `YYYY-MM-DD` for day and week, `YYYY-MM` for month.
    pub fn label(&self) -> String {
        self.start.format(self.granularity.label_format()).to_string()
    }

    pub fn next(&self) -> Self {
        Self::starting_at(self.granularity, self.end)
    }

    pub fn previous(&self) -> Self {
        Self::starting_at(self.granularity, self.granularity.step(self.start, false))
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}, {})", self.granularity, self.start, self.end)
    }
}

/// Generate `n` contiguous periods, oldest first.
///
/// The sequence is anchored to the period containing `now` and ends
/// `cutoff_days` (converted to whole periods) before it, so the last window
/// is the most recently completed one when `cutoff_days` is zero. A cutoff
/// moves the anchor by an integer number of periods; it is not a plain shift
/// by `cutoff_days`.
pub fn generate(
    granularity: Granularity,
    n: usize,
    cutoff_days: u32,
    now: DateTime<Utc>,
) -> Result<Vec<Period>> {
    if n == 0 {
        return Err(Error::InvalidWindowCount(n));
    }

    let anchor = granularity.current_start(now.date_naive());
    let first = i64::try_from(n)
        .ok()
        .and_then(|n| n.checked_add(granularity.cutoff_periods(cutoff_days)))
        .and_then(|skip| granularity.checked_shift(anchor, -skip))
        .ok_or(Error::PeriodOutOfRange {
            granularity,
            n,
            cutoff_days,
        })?;
    let mut period = Period::starting_at(granularity, first);

    let mut periods = Vec::with_capacity(n);
    for _ in 0..n {
        periods.push(period);
        period = period.next();
    }
    Ok(periods)
}

/// The most recently completed period and the one before it, as
/// `(latest, previous)`. Used for period-over-period trends.
pub fn latest_and_previous(granularity: Granularity, now: DateTime<Utc>) -> (Period, Period) {
    let current = Period::starting_at(granularity, granularity.current_start(now.date_naive()));
    let latest = current.previous();
    (latest, latest.previous())
}
