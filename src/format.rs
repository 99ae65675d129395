use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::fmt::Display;

pub const NO_VALUE: &str = "—";

fn parse_timestamp(raw: &str) -> Option<DateTime<chrono::Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    // MySQL-style timestamps without offset are taken as UTC
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Time spent between check-in and check-out, e.g. `1h 30m`.
pub fn format_duration(check_in: Option<&str>, check_out: Option<&str>) -> String {
    let (Some(start), Some(end)) = (
        check_in.and_then(parse_timestamp),
        check_out.and_then(parse_timestamp),
    ) else {
        return NO_VALUE.to_string();
    };
    let minutes = (end - start).num_minutes();
    if minutes < 0 {
        return NO_VALUE.to_string();
    }
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours == 0 {
        format!("{}m", minutes)
    } else {
        format!("{}h {}m", hours, minutes)
    }
}

pub fn format_timestamp_in<Tz>(raw: Option<&str>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => String::new(),
        Some(raw) => match parse_timestamp(raw) {
            Some(dt) => dt.with_timezone(tz).format("%d/%m/%Y %H:%M").to_string(),
            None => raw.to_string(),
        },
    }
}

/// Local display form; unparsable values are shown as received.
pub fn format_timestamp(raw: Option<&str>) -> String {
    format_timestamp_in(raw, &Local)
}

pub fn format_timestamp_or_dash(raw: Option<&str>) -> String {
    let formatted = format_timestamp(raw);
    if formatted.is_empty() {
        NO_VALUE.to_string()
    } else {
        formatted
    }
}

/// Day bucket `YYYY-MM-DD` for a timestamp, if it parses.
pub fn day_key(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Whole percentage, 0 when there is nothing to divide by.
pub fn percent(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (part as f64 * 100.0 / total as f64).round() as u64
}
