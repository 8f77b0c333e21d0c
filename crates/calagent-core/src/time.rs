//! Time types for calendar events.
//!
//! This module provides [`EventTime`] for representing event start/end times
//! (either a precise timestamp or an all-day date), and the parsers that turn
//! user or model supplied ISO-8601 text into those values.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp layouts accepted without an explicit UTC offset.
///
/// Offset-less timestamps are interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Timestamp layouts with a compact offset such as `+0200`.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"];

/// Errors produced when parsing event time text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    /// The input was empty or whitespace.
    #[error("empty time value")]
    Empty,

    /// The input did not match any supported ISO-8601 layout.
    #[error("invalid ISO-8601 time '{0}' (expected e.g. 2025-10-09T14:00:00)")]
    Invalid(String),
}

/// Represents the time of a calendar event endpoint.
///
/// Exactly one representation is present per endpoint:
/// - **DateTime**: A specific point in time, keeping the offset it was given in
/// - **AllDay**: A date without a specific time (all-day events)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime with its UTC offset.
    DateTime(DateTime<FixedOffset>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt.fixed_offset())
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the datetime if this is a `DateTime` variant.
    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            Self::AllDay(_) => None,
        }
    }

    /// Returns the date if this is an `AllDay` variant.
    pub fn as_date(&self) -> Option<&NaiveDate> {
        match self {
            Self::AllDay(d) => Some(d),
            Self::DateTime(_) => None,
        }
    }

    /// Converts to a UTC datetime for comparison purposes.
    ///
    /// For all-day events, returns midnight UTC on that date.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => dt.with_timezone(&Utc),
            Self::AllDay(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Returns the calendar date of this endpoint in its own offset.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date_naive(),
            Self::AllDay(date) => *date,
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Chronological, all-day dates at midnight UTC. At the same instant an
/// all-day endpoint sorts first, so `Equal` only when `==`.
impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime()
            .cmp(&other.to_utc_datetime())
            .then_with(|| other.is_all_day().cmp(&self.is_all_day()))
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Self::AllDay(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// Parses an event endpoint from ISO-8601 text.
///
/// Accepts RFC 3339 timestamps, timestamps without an offset (taken as UTC),
/// and bare `YYYY-MM-DD` dates, which become all-day endpoints.
pub fn parse_event_time(input: &str) -> Result<EventTime, TimeParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TimeParseError::Empty);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(EventTime::AllDay(date));
    }

    parse_timestamp(input)
        .map(EventTime::DateTime)
        .ok_or_else(|| TimeParseError::Invalid(input.to_string()))
}

/// Parses an instant from ISO-8601 text.
///
/// Same layouts as [`parse_event_time`]; a bare date means midnight UTC.
pub fn parse_instant(input: &str) -> Result<DateTime<FixedOffset>, TimeParseError> {
    match parse_event_time(input)? {
        EventTime::DateTime(dt) => Ok(dt),
        all_day @ EventTime::AllDay(_) => Ok(all_day.to_utc_datetime().fixed_offset()),
    }
}

fn parse_timestamp(input: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt);
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(input, format) {
            return Some(dt);
        }
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn naive_timestamp_is_utc() {
        let parsed = parse_event_time("2025-10-09T14:00:00").unwrap();
        assert_eq!(parsed, EventTime::from_utc(utc(2025, 10, 9, 14, 0)));
        assert_eq!(parsed.as_datetime().unwrap().offset().local_minus_utc(), 0);
    }

    #[test]
    fn rfc3339_keeps_offset() {
        let parsed = parse_event_time("2025-10-09T14:00:00+02:00").unwrap();
        let dt = parsed.as_datetime().unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(parsed.to_utc_datetime(), utc(2025, 10, 9, 12, 0));
    }

    #[test]
    fn compact_offset_and_minutes_only() {
        let parsed = parse_event_time("2025-10-09T14:00:00-0500").unwrap();
        assert_eq!(parsed.to_utc_datetime(), utc(2025, 10, 9, 19, 0));

        let parsed = parse_event_time("2025-10-09T09:30").unwrap();
        assert_eq!(parsed.to_utc_datetime(), utc(2025, 10, 9, 9, 30));

        let parsed = parse_event_time("2025-10-09 09:30:00").unwrap();
        assert_eq!(parsed.to_utc_datetime(), utc(2025, 10, 9, 9, 30));
    }

    #[test]
    fn bare_date_is_all_day() {
        let parsed = parse_event_time(" 2025-10-09 ").unwrap();
        assert_eq!(parsed, EventTime::AllDay(date(2025, 10, 9)));
        assert!(parsed.is_all_day());
    }

    #[test]
    fn instant_from_date_is_midnight_utc() {
        let parsed = parse_instant("2025-10-09").unwrap();
        assert_eq!(parsed.with_timezone(&Utc), utc(2025, 10, 9, 0, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_event_time(""), Err(TimeParseError::Empty));
        assert_eq!(
            parse_event_time("tomorrow at 3"),
            Err(TimeParseError::Invalid("tomorrow at 3".to_string()))
        );
        assert!(parse_event_time("2025-13-40T25:00:00").is_err());
    }

    #[test]
    fn ordering_mixes_dates_and_datetimes() {
        let all_day = EventTime::AllDay(date(2025, 10, 9));
        let morning = EventTime::from_utc(utc(2025, 10, 9, 8, 0));
        let previous_evening = EventTime::from_utc(utc(2025, 10, 8, 20, 0));

        let mut times = vec![morning.clone(), all_day.clone(), previous_evening.clone()];
        times.sort();
        assert_eq!(times, vec![previous_evening, all_day, morning]);
    }

    #[test]
    fn ordering_agrees_with_equality() {
        let all_day = EventTime::AllDay(date(2025, 10, 9));
        let midnight = EventTime::from_utc(utc(2025, 10, 9, 0, 0));
        assert_ne!(all_day, midnight);
        assert_eq!(all_day.cmp(&midnight), Ordering::Less);
        assert_eq!(midnight.cmp(&all_day), Ordering::Greater);

        // Same instant written with another offset is the same endpoint
        let paris = parse_event_time("2025-10-09T02:00:00+02:00").unwrap();
        assert_eq!(paris, midnight);
        assert_eq!(paris.cmp(&midnight), Ordering::Equal);
    }

    #[test]
    fn display_formats() {
        assert_eq!(
            EventTime::from_utc(utc(2025, 10, 9, 14, 0)).to_string(),
            "2025-10-09T14:00:00+00:00"
        );
        assert_eq!(EventTime::AllDay(date(2025, 10, 9)).to_string(), "2025-10-09");
    }

    #[test]
    fn serde_roundtrip() {
        let time = parse_event_time("2025-10-09T14:00:00+02:00").unwrap();
        let json = serde_json::to_string(&time).unwrap();
        let back: EventTime = serde_json::from_str(&json).unwrap();
        assert_eq!(time, back);
    }
}
