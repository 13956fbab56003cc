//! Shared utility functions: license durations and expiration checks.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::error::AppError;

/// How long a newly issued license stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseDuration {
    Lifetime,
    Days(u32),
}

impl LicenseDuration {
    /// Calculate the `valid_until` value for a license issued at `base_time`.
    ///
    /// Returns None for lifetime licenses.
    pub fn valid_until(&self, base_time: DateTime<Utc>) -> Result<Option<String>, AppError> {
        match self {
            LicenseDuration::Lifetime => Ok(None),
            LicenseDuration::Days(days) => valid_until_from_days(*days, base_time).map(Some),
        }
    }

    /// Label stored in the record's `duration` column.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LicenseDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LicenseDuration::Lifetime => write!(f, "lifetime"),
            LicenseDuration::Days(days) => write!(f, "{}_days", days),
        }
    }
}

impl FromStr for LicenseDuration {
    type Err = AppError;

    /// Accepts `lifetime`, `3_day`, `1_month`, `1_year`, `N_days`, or a bare day count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let days = match s.as_str() {
            "lifetime" => return Ok(LicenseDuration::Lifetime),
            "3_day" => 3,
            "1_month" => 30,
            "1_year" => 365,
            other => other
                .strip_suffix("_days")
                .or_else(|| other.strip_suffix("_day"))
                .unwrap_or(other)
                .parse::<u32>()
                .map_err(|_| AppError::BadRequest(format!("Invalid duration: {}", s)))?,
        };

        if days == 0 {
            return Err(AppError::BadRequest("Duration must be positive".into()));
        }
        Ok(LicenseDuration::Days(days))
    }
}

/// `base_time + days`, formatted as RFC 3339 with second precision.
///
/// Fails when the result falls outside chrono's representable range.
pub fn valid_until_from_days(days: u32, base_time: DateTime<Utc>) -> Result<String, AppError> {
    Duration::try_days(i64::from(days))
        .and_then(|delta| base_time.checked_add_signed(delta))
        .map(|until| until.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| AppError::BadRequest("Duration too large".into()))
}

/// Parse a stored `valid_until` value.
///
/// Accepts RFC 3339, naive ISO-8601 datetimes (taken as UTC), and bare dates
/// (end of validity = start of that day, UTC).
pub fn parse_valid_until(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Whether a record with this `valid_until` is unusable at `now`.
///
/// None means lifetime. An unparseable value counts as expired.
pub fn is_expired(valid_until: Option<&str>, now: DateTime<Utc>) -> bool {
    match valid_until {
        None => false,
        Some(raw) if raw.trim().is_empty() => false,
        Some(raw) => match parse_valid_until(raw) {
            Some(until) => now > until,
            None => true,
        },
    }
}
