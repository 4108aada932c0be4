//! Timestamp normalization.
//!
//! Every upstream encodes time differently: ISO dates with a separate
//! 12-hour clock, SQL timestamps, RFC 2822 publication dates, and ad hoc
//! `YYYY/MM/DD h:mm am` strings embedded in HTML. The functions here turn all
//! of them into UTC instants. Zone-naive values are always resolved against
//! the civil timezone passed in by the caller, never one guessed from the
//! string. Parsing never fails loudly: callers get `None` and apply their own
//! fallback.

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::UNTITLED_ID_PLACEHOLDER;

static CLOCK_12H: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?::(\d{2}))?\s*([ap])\.?\s*m\.?$").expect("static regex")
});

static SLASH_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{4})/(\d{1,2})/(\d{1,2})\s+(\d{1,2}):(\d{2})\s*([ap])\.?m\.?$")
        .expect("static regex")
});

/// Resolve a wall-clock time in `tz` to a UTC instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// spring-forward gap are shifted one hour later.
pub fn resolve_local(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert a 12-hour clock hour to 24-hour.
pub fn to_24_hour(hour: u32, is_pm: bool) -> u32 {
    match (hour, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    }
}

/// Parse a clock string like "10:00 pm", "7 p.m." or "19:30".
pub fn parse_clock(clock: &str) -> Option<NaiveTime> {
    let clock = clock.trim();

    if let Some(captures) = CLOCK_12H.captures(clock) {
        let hour: u32 = captures.get(1)?.as_str().parse().ok()?;
        let minute: u32 = captures
            .get(2)
            .map(|m| m.as_str().parse().unwrap_or(0))
            .unwrap_or(0);
        if !(1..=12).contains(&hour) {
            return None;
        }
        let is_pm = captures.get(3)?.as_str().eq_ignore_ascii_case("p");
        return NaiveTime::from_hms_opt(to_24_hour(hour, is_pm), minute, 0);
    }

    NaiveTime::parse_from_str(clock, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(clock, "%H:%M:%S"))
        .ok()
}

/// ISO date plus a separate clock string, e.g. `2025-09-19` + `10:00 pm`.
pub fn parse_date_and_clock(date: &str, clock: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time = parse_clock(clock)?;
    resolve_local(day.and_time(time), tz)
}

/// SQL-style `YYYY-MM-DD HH:MM:SS` (seconds and time optional).
pub fn parse_sql_timestamp(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    resolve_local(naive, tz)
}

/// RFC 2822 publication dates; RFC 3339 accepted as a fallback.
pub fn parse_rfc2822(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// ISO 8601 with or without an offset. Offset-less values are civil time in `tz`.
pub fn parse_iso_instant(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // Offsets without a colon, e.g. 2025-09-19T19:00:00-0400
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    resolve_local(naive, tz)
}

/// `YYYY/MM/DD h:mm am|pm`, the format event plugins print on detail pages.
pub fn parse_slash_datetime(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let captures = SLASH_DATETIME.captures(value.trim())?;
    let number = |i: usize| -> Option<u32> { captures.get(i)?.as_str().parse().ok() };

    let year: i32 = captures.get(1)?.as_str().parse().ok()?;
    let hour = number(4)?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let is_pm = captures.get(6)?.as_str().eq_ignore_ascii_case("p");

    let day = NaiveDate::from_ymd_opt(year, number(2)?, number(3)?)?;
    let time = NaiveTime::from_hms_opt(to_24_hour(hour, is_pm), number(5)?, 0)?;
    resolve_local(day.and_time(time), tz)
}

/// Build the human-debuggable event id: `YYMMDDHHmm` in the instant's local
/// calendar fields, followed by the first three ASCII letters of the title.
pub fn format_title_and_date_to_id<T: TimeZone>(instant: &DateTime<T>, title: &str) -> String {
    let title = if title.is_empty() {
        UNTITLED_ID_PLACEHOLDER
    } else {
        title
    };
    let prefix: String = title
        .chars()
        .filter(char::is_ascii_alphabetic)
        .take(3)
        .collect::<String>()
        .to_lowercase();

    format!(
        "{:02}{:02}{:02}{:02}{:02}{}",
        instant.year().rem_euclid(100),
        instant.month(),
        instant.day(),
        instant.hour(),
        instant.minute(),
        prefix
    )
}
