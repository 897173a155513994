//! Date parsing boundary.
//!
//! Every date string that enters the crate goes through [`parse_date`] or
//! [`parse_instant`]. Past this point all logic works on `NaiveDate` (calendar
//! dates, compared as UTC midnight) and `DateTime<Utc>`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const PT_MONTHS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("unrecognized date `{0}`")]
    Unrecognized(String),
}

/// Parse a calendar date.
///
/// Accepts `yyyy-mm-dd`, `dd/mm/yyyy`, RFC 3339 timestamps (reduced to their
/// UTC date) and zone-less `yyyy-mm-ddTHH:MM[:SS]` values (reduced to their
/// date part). Blank input is `Ok(None)`.
pub fn parse_date(value: &str) -> Result<Option<NaiveDate>, DateError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    if let Some(date) = parse_date_only(value) {
        return Ok(Some(date));
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(instant.with_timezone(&Utc).date_naive()));
    }
    if let Some(naive) = parse_naive_datetime(value) {
        return Ok(Some(naive.date()));
    }

    Err(DateError::Unrecognized(value.to_string()))
}

/// Parse an instant. Zone-less values are read as UTC; date-only values
/// become UTC midnight of that date.
pub fn parse_instant(value: &str) -> Result<Option<DateTime<Utc>>, DateError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(instant.with_timezone(&Utc)));
    }
    if let Some(naive) = parse_naive_datetime(value) {
        return Ok(Some(naive.and_utc()));
    }
    if let Some(midnight) = parse_date_only(value).and_then(|date| date.and_hms_opt(0, 0, 0)) {
        return Ok(Some(midnight.and_utc()));
    }

    Err(DateError::Unrecognized(value.to_string()))
}

fn parse_date_only(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Short pt-BR month label, e.g. `jul/25`.
pub fn month_label(date: NaiveDate) -> String {
    format!("{}/{}", PT_MONTHS[date.month0() as usize], date.format("%y"))
}

/// Whole days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
