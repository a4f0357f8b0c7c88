//! Time utilities for snooze
//!
//! The panel reports run start times in UTC; idle checks compare them with
//! the current time in a configured fixed offset.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::error::ConfigError;

/// Parse a UTC offset such as `+00:00`, `-03:00`, `+0530`, `+02` or `Z`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let value = value.trim();
    let invalid = || ConfigError::Invalid(format!("invalid UTC offset '{}'", value));

    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(invalid()),
    };

    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Current time in `offset`
pub fn now_in(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

/// Whole minutes from `since` to `now`, truncated toward zero.
///
/// Negative when `since` is in the future (clock skew with the panel).
pub fn elapsed_minutes(since: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> i64 {
    (now - since).num_minutes()
}

/// Parse a panel timestamp as UTC.
///
/// Accepts RFC 3339 and `YYYY-MM-DD HH:MM:SS` with optional fractional
/// seconds or a `T` separator; offset-less values are taken as UTC.
pub fn parse_panel_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
