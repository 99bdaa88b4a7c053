//! Wall-clock ↔ UTC conversion in IANA timezones.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{CalendarError, Result};

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse an IANA timezone name such as `"America/New_York"` or `"UTC"`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse()
        .map_err(|_| CalendarError::InvalidTimezone(name.to_string()))
}

/// Convert a wall-clock time in `tz` to UTC.
///
/// Ambiguous times (the repeated hour when clocks fall back) resolve to the
/// earlier instant.
///
/// # Errors
/// Returns `CalendarError::InvalidDateTime` for a time that does not exist in
/// `tz` (the skipped hour when clocks spring forward).
pub fn local_to_utc(local: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(CalendarError::InvalidDateTime(format!(
            "{} does not exist in {}",
            local, tz
        ))),
    }
}

/// Parse a user-supplied instant.
///
/// Accepts RFC 3339 (`2025-01-01T12:30:00Z`, `2025-01-01T12:30:00+02:00`),
/// local date-times (`2025-01-01T12:30`, `2025-01-01 12:30:00`) interpreted in
/// `tz`, and bare dates (`2025-01-01`) meaning local midnight.
pub fn parse_instant(input: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in LOCAL_FORMATS {
        if let Ok(local) = NaiveDateTime::parse_from_str(input, format) {
            return local_to_utc(local, tz);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return local_to_utc(date.and_time(NaiveTime::MIN), tz);
    }

    Err(CalendarError::InvalidDateTime(format!(
        "'{}' is not a recognised date or date-time",
        input
    )))
}
