use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// First calendar day of the month containing `d`.
pub fn first_of_month(d: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(d.year(), d.month(), 1).unwrap()
}

/// Shift a first-of-month date by `delta` calendar months (negative goes
/// back). `None` when the result is outside chrono's date range.
pub fn shift_months(first: NaiveDate, delta: i64) -> Option<NaiveDate> {
    let index = (first.year() as i64 * 12 + first.month0() as i64).checked_add(delta)?;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Monday of the ISO week containing `d`.
pub fn monday_of(d: NaiveDate) -> NaiveDate {
    d - Duration::days(d.weekday().num_days_from_monday() as i64)
}

/// Midnight UTC at the start of `d`.
pub fn start_of_day(d: NaiveDate) -> DateTime<Utc> {
    d.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

/// Parse a `YYYY-MM-DD` string into the UTC instant at the start of that day.
pub fn parse_as_of(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .map(start_of_day)
}
