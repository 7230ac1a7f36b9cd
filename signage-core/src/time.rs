//! Time utilities: time-of-day strings, weekdays, calendar dates and minute spans.
//!
//! Times travel as strings (`HH:MM` or `HH:MM:SS`). Internally a [`TimeOfDay`]
//! is seconds since midnight, with `24:00:00` allowed as the end-of-day sentinel.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TimeError;

pub const SECONDS_PER_DAY: u32 = 86_400;
pub const MINUTES_PER_DAY: u32 = 1_440;

static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$").expect("time pattern must compile")
});

/// A time of day in `[00:00:00, 24:00:00]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(0);
    pub const END_OF_DAY: Self = Self(SECONDS_PER_DAY);

    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Result<Self, TimeError> {
        if minute >= 60 || second >= 60 || hour > 24 || (hour == 24 && (minute, second) != (0, 0)) {
            return Err(TimeError::OutOfRange(format!("{hour:02}:{minute:02}:{second:02}")));
        }
        Ok(Self(hour * 3600 + minute * 60 + second))
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(Self(minutes * 60))
    }

    /// Parse `HH:MM` or `HH:MM:SS` (single-digit hours are tolerated).
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let caps = TIME_PATTERN
            .captures(s.trim())
            .ok_or_else(|| TimeError::InvalidTime(s.to_string()))?;

        let field = |i: usize| -> Result<u32, TimeError> {
            caps.get(i)
                .map(|m| m.as_str().parse::<u32>())
                .transpose()
                .map_err(|_| TimeError::InvalidTime(s.to_string()))
                .map(|v| v.unwrap_or(0))
        };

        Self::from_hms(field(1)?, field(2)?, field(3)?)
    }

    pub fn seconds(self) -> u32 {
        self.0
    }

    /// Whole minutes since midnight (seconds are truncated).
    pub fn minutes(self) -> u32 {
        self.0 / 60
    }

    pub fn is_midnight(self) -> bool {
        self.0 == 0
    }

    pub fn is_end_of_day(self) -> bool {
        self.0 == SECONDS_PER_DAY
    }

    /// Whether the value carries seconds the `HH:MM` wire format would drop.
    pub fn has_seconds(self) -> bool {
        self.0 % 60 != 0
    }

    /// `23:59:00`, the wire's spelling of end of day.
    pub fn is_wire_end_of_day(self) -> bool {
        self.0 == SECONDS_PER_DAY - 60
    }

    /// `None` when the result would pass `24:00:00`.
    pub fn checked_add_minutes(self, minutes: u32) -> Option<Self> {
        let secs = self.0.checked_add(minutes.checked_mul(60)?)?;
        (secs <= SECONDS_PER_DAY).then_some(Self(secs))
    }

    /// `HH:MM` for the wire. `24:00` is not accepted by the server and degrades to `23:59`.
    pub fn to_wire(self) -> String {
        if self.is_end_of_day() {
            return "23:59".to_string();
        }
        format!("{:02}:{:02}", self.0 / 3600, (self.0 % 3600) / 60)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.0 / 3600,
            (self.0 % 3600) / 60,
            self.0 % 60
        )
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Accepts full names and three-letter abbreviations in any case.
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        let day = match s.trim().to_lowercase().as_str() {
            "monday" | "mon" => DayOfWeek::Monday,
            "tuesday" | "tue" => DayOfWeek::Tuesday,
            "wednesday" | "wed" => DayOfWeek::Wednesday,
            "thursday" | "thu" => DayOfWeek::Thursday,
            "friday" | "fri" => DayOfWeek::Friday,
            "saturday" | "sat" => DayOfWeek::Saturday,
            "sunday" | "sun" => DayOfWeek::Sunday,
            _ => return Err(TimeError::InvalidDay(s.to_string())),
        };
        Ok(day)
    }

    pub fn of_date(date: NaiveDate) -> Self {
        use chrono::Datelike;
        date.weekday().into()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
            DayOfWeek::Sunday => "SUNDAY",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse an ISO `YYYY-MM-DD` date. A trailing time component (`T...`) is ignored.
pub fn parse_date(s: &str) -> Result<NaiveDate, TimeError> {
    let s = s.trim();
    let day_part = s.split_once('T').map(|(d, _)| d).unwrap_or(s);
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").map_err(|_| TimeError::InvalidDate(s.to_string()))
}

/// The calendar date `now` falls on in the IANA timezone `tz`.
pub fn local_today(tz: &str, now: DateTime<Utc>) -> Result<NaiveDate> {
    let tz: Tz = tz
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))?;
    Ok(now.with_timezone(&tz).date_naive())
}

/// A half-open `[start, end)` range in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinuteSpan {
    pub start: u32,
    pub end: u32,
}

impl MinuteSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Span of a `[start, end)` time pair. `00:00 -> 00:00` is the whole day.
    pub fn of_times(start: TimeOfDay, end: TimeOfDay) -> Self {
        if start.is_midnight() && end.is_midnight() {
            return Self::new(0, MINUTES_PER_DAY);
        }
        Self::new(start.minutes(), end.minutes())
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &MinuteSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for MinuteSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!(TimeOfDay::parse("08:30").unwrap().to_string(), "08:30:00");
        assert_eq!(TimeOfDay::parse("8:05:09").unwrap().to_string(), "08:05:09");
        assert!(TimeOfDay::parse("24:00").unwrap().is_end_of_day());
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        assert!(TimeOfDay::parse("24:01").is_err());
        assert!(TimeOfDay::parse("12:60").is_err());
        assert!(TimeOfDay::parse("noon").is_err());
        assert!(TimeOfDay::parse("").is_err());
    }

    #[test]
    fn wire_format_truncates_seconds_and_degrades_end_of_day() {
        assert_eq!(TimeOfDay::parse("09:15:45").unwrap().to_wire(), "09:15");
        assert_eq!(TimeOfDay::END_OF_DAY.to_wire(), "23:59");
    }

    #[test]
    fn flags_values_the_wire_cannot_carry() {
        assert!(TimeOfDay::parse("08:00:30").unwrap().has_seconds());
        assert!(!TimeOfDay::parse("08:00").unwrap().has_seconds());
        assert!(TimeOfDay::parse("23:59").unwrap().is_wire_end_of_day());
        assert!(!TimeOfDay::parse("23:59:30").unwrap().is_wire_end_of_day());
    }

    #[test]
    fn add_minutes_stops_at_end_of_day() {
        let t = TimeOfDay::parse("23:30").unwrap();
        assert_eq!(t.checked_add_minutes(30), Some(TimeOfDay::END_OF_DAY));
        assert_eq!(t.checked_add_minutes(31), None);
    }

    #[test]
    fn midnight_to_midnight_is_whole_day() {
        let span = MinuteSpan::of_times(TimeOfDay::MIDNIGHT, TimeOfDay::MIDNIGHT);
        assert_eq!(span, MinuteSpan::new(0, MINUTES_PER_DAY));
    }

    #[test]
    fn half_open_overlap() {
        let a = MinuteSpan::new(480, 600);
        let b = MinuteSpan::new(600, 660);
        let c = MinuteSpan::new(599, 601);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn day_names_parse_loosely() {
        assert_eq!(DayOfWeek::parse("monday").unwrap(), DayOfWeek::Monday);
        assert_eq!(DayOfWeek::parse("SAT").unwrap(), DayOfWeek::Saturday);
        assert!(DayOfWeek::parse("someday").is_err());
        let d = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        assert_eq!(DayOfWeek::of_date(d), DayOfWeek::Thursday);
    }

    #[test]
    fn dates_ignore_time_suffix() {
        let d = parse_date("2026-03-01T00:00:00.000Z").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert!(parse_date("03/01/2026").is_err());
    }

    #[test]
    fn local_today_respects_timezone() {
        let now = Utc.with_ymd_and_hms(2026, 2, 21, 3, 0, 0).unwrap();
        let day = local_today("America/Chicago", now).unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2026, 2, 20).unwrap());
        assert!(local_today("Mars/Base", now).is_err());
    }
}
