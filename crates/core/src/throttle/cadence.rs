//! Parser for the re-search cadence strings reported by the media service.
//!
//! Supported forms (case-insensitive):
//! - `"HH:MM"` / `"HH:MM:SS"` (seconds are ignored)
//! - bare integer, read as hours
//! - `"<N>h"`, `"<N>m"`, `"<N>s"`
//! - `"every N hours"`, `"every N minutes"`, `"every day"`, `"every <weekday>"`

use std::time::Duration;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

static EVERY_HOURS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"every\s+(\d+)\s+hours?").expect("valid regex"));
static EVERY_MINUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"every\s+(\d+)\s+minutes?").expect("valid regex"));

/// Errors produced by [`parse_cadence`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CadenceParseError {
    #[error("Cadence string is empty")]
    Empty,

    #[error("Unrecognized cadence format: {0}")]
    Unrecognized(String),

    #[error("Invalid number in cadence: {0}")]
    InvalidNumber(String),
}

fn number(raw: &str, whole: &str) -> Result<u64, CadenceParseError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| CadenceParseError::InvalidNumber(whole.to_string()))
}

fn scaled(value: u64, factor: u64, whole: &str) -> Result<u64, CadenceParseError> {
    value
        .checked_mul(factor)
        .ok_or_else(|| CadenceParseError::InvalidNumber(whole.to_string()))
}

fn minutes(m: u64, whole: &str) -> Result<Duration, CadenceParseError> {
    scaled(m, 60, whole).map(Duration::from_secs)
}

fn hours(h: u64, whole: &str) -> Result<Duration, CadenceParseError> {
    minutes(scaled(h, 60, whole)?, whole)
}

/// Parse a cadence string into an interval with minute precision.
pub fn parse_cadence(raw: &str) -> Result<Duration, CadenceParseError> {
    let s = raw.trim().to_lowercase();
    if s.is_empty() {
        return Err(CadenceParseError::Empty);
    }

    if s.starts_with("every") {
        if s.contains("hour") {
            if let Some(caps) = EVERY_HOURS.captures(&s) {
                return hours(number(&caps[1], raw)?, raw);
            }
        } else if s.contains("minute") {
            if let Some(caps) = EVERY_MINUTES.captures(&s) {
                return minutes(number(&caps[1], raw)?, raw);
            }
        } else if WEEKDAYS.iter().any(|day| s.contains(day)) {
            return hours(168, raw);
        } else if s.contains("day") {
            return hours(24, raw);
        }
    }

    if s.contains(':') {
        let mut parts = s.split(':');
        let h = number(parts.next().unwrap_or_default(), raw)?;
        let m = number(parts.next().unwrap_or_default(), raw)?;
        let total = scaled(h, 60, raw)?
            .checked_add(m)
            .ok_or_else(|| CadenceParseError::InvalidNumber(raw.to_string()))?;
        return minutes(total, raw);
    }

    if let Some(n) = s.strip_suffix('h') {
        return hours(number(n, raw)?, raw);
    }
    if let Some(n) = s.strip_suffix('m') {
        return minutes(number(n, raw)?, raw);
    }
    if let Some(n) = s.strip_suffix('s') {
        return minutes(number(n, raw)? / 60, raw);
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return hours(number(&s, raw)?, raw);
    }

    Err(CadenceParseError::Unrecognized(raw.to_string()))
}
