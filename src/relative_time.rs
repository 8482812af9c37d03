//! Relative timestamp parsing
//!
//! Turns strings such as "5 mins", "2 hours ago" or "Yesterday at 14:30"
//! into absolute UTC instants. Parsing never fails: anything unrecognised
//! resolves to the reference instant.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc};
use regex::Regex;

/// Naive formats tried after the relative patterns; values are taken as UTC
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%d.%m.%Y %H:%M"];
const NAIVE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy)]
enum Unit {
    Minutes,
    Hours,
    Days,
}

impl Unit {
    fn delta(self, amount: i64) -> Option<TimeDelta> {
        match self {
            Unit::Minutes => TimeDelta::try_minutes(amount),
            Unit::Hours => TimeDelta::try_hours(amount),
            Unit::Days => TimeDelta::try_days(amount),
        }
    }
}

/// Relative patterns in priority order
fn relative_patterns() -> &'static [(Regex, Unit)] {
    static PATTERNS: OnceLock<Vec<(Regex, Unit)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?i)(\d+)\s*(min|mins|minute|minutes)\b", Unit::Minutes),
            (r"(?i)(\d+)\s*(h|hr|hrs|hour|hours)\b", Unit::Hours),
            (r"(?i)(\d+)\s*(d|day|days)\b", Unit::Days),
        ]
        .into_iter()
        .filter_map(|(pattern, unit)| Regex::new(pattern).ok().map(|re| (re, unit)))
        .collect()
    })
}

fn clock_pattern() -> Option<&'static Regex> {
    static CLOCK: OnceLock<Option<Regex>> = OnceLock::new();
    CLOCK
        .get_or_init(|| Regex::new(r"(\d{1,2}):(\d{2})").ok())
        .as_ref()
}

/// Parse a loosely formatted timestamp relative to `now` (defaults to the current time)
///
/// Recognised, in order: "just now"/"now", "yesterday [at HH:MM]",
/// "<N> min(s)", "<N> h/hour(s)", "<N> d/day(s)", then a few absolute
/// formats. Anything else returns the reference instant.
pub fn parse_relative_time(text: &str, now: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now.unwrap_or_else(Utc::now);
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    if lower == "just now" || lower == "now" {
        return now;
    }

    if lower.starts_with("yesterday") {
        return parse_yesterday(&lower, now);
    }

    for (re, unit) in relative_patterns() {
        if let Some(caps) = re.captures(&lower) {
            return caps[1]
                .parse::<i64>()
                .ok()
                .and_then(|amount| unit.delta(amount))
                .and_then(|delta| now.checked_sub_signed(delta))
                .unwrap_or(now);
        }
    }

    parse_absolute(trimmed).unwrap_or(now)
}

/// Render an instant as ISO 8601 in UTC, e.g. `2024-01-15T10:30:00+00:00`
pub fn to_iso_utc<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn parse_yesterday(lower: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let day_before = match TimeDelta::try_days(1).and_then(|d| now.checked_sub_signed(d)) {
        Some(dt) => dt,
        None => return now,
    };

    let time_of_day = clock_pattern().and_then(|re| re.captures(lower)).and_then(|caps| {
        let hour = caps[1].parse::<u32>().ok()?;
        let minute = caps[2].parse::<u32>().ok()?;
        day_before.date_naive().and_hms_opt(hour, minute, 0)
    });

    match time_of_day {
        Some(naive) => naive.and_utc(),
        None => day_before,
    }
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, NAIVE_DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
