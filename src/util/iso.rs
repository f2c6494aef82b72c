use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::task::Length;

/// Length of a date-only ISO string (`YYYY-MM-DD`)
pub const DATE_LEN: usize = 10;
/// Length of a minute-precision ISO string (`YYYY-MM-DDTHH:mm`)
pub const DATE_TIME_LEN: usize = 16;

const DATE_FMT: &str = "%Y-%m-%d";
const DATE_TIME_FMT: &str = "%Y-%m-%dT%H:%M";

/// A point on the calendar: either a whole day or a wall-clock minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum When {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl When {
    pub fn date(&self) -> NaiveDate {
        match self {
            When::Date(d) => *d,
            When::DateTime(dt) => dt.date(),
        }
    }

    pub fn is_date_only(&self) -> bool {
        matches!(self, When::Date(_))
    }

    /// The instant this value starts at. Whole days start at midnight.
    pub fn start(&self) -> NaiveDateTime {
        match self {
            When::Date(d) => d.and_time(NaiveTime::MIN),
            When::DateTime(dt) => *dt,
        }
    }

    /// Combine with a clock time, producing a date-time on the same day.
    pub fn at(&self, time: NaiveTime) -> When {
        When::DateTime(self.date().and_time(time))
    }
}

impl fmt::Display for When {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            When::Date(d) => write!(f, "{}", d.format(DATE_FMT)),
            When::DateTime(dt) => write!(f, "{}", dt.format(DATE_TIME_FMT)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not an ISO date or date-time: {0:?}")]
pub struct IsoParseError(pub String);

impl FromStr for When {
    type Err = IsoParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_when(s).ok_or_else(|| IsoParseError(s.to_string()))
    }
}

impl Serialize for When {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for When {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// True when an ISO string carries no time of day.
pub fn is_date_only(s: &str) -> bool {
    s.len() == DATE_LEN
}

/// Parse a date or date-time. Accepts a `T` or a space separator; anything
/// after the minutes (seconds, fractions, offsets) is dropped so the result
/// stays on the local wall clock.
pub fn parse_when(s: &str) -> Option<When> {
    let s = s.trim();
    if s.len() < DATE_LEN || !s.is_char_boundary(DATE_LEN) {
        return None;
    }
    let date = parse_date(&s[..DATE_LEN])?;
    if s.len() == DATE_LEN {
        return Some(When::Date(date));
    }
    let rest = &s[DATE_LEN..];
    let rest = rest.strip_prefix('T').or_else(|| rest.strip_prefix(' '))?;
    if rest.len() < 5 || !rest.is_char_boundary(5) {
        return None;
    }
    let time = parse_time(&rest[..5])?;
    Some(When::DateTime(date.and_time(time)))
}

/// Parse `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() != DATE_LEN {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FMT).ok()
}

/// Parse a wall-clock `HH:mm` (single-digit hours allowed).
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let (h, m) = s.trim().split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

pub fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Render a date-time at minute precision.
pub fn to_iso(dt: NaiveDateTime) -> String {
    When::DateTime(truncate_to_minute(dt)).to_string()
}

pub fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Round to the nearest quarter hour. Ties round up.
pub fn round_to_quarter(dt: NaiveDateTime) -> NaiveDateTime {
    let base = truncate_to_minute(dt);
    let offset_secs = i64::from(dt.minute() % 15) * 60 + i64::from(dt.second());
    let floor = base - Duration::minutes(i64::from(dt.minute() % 15));
    if offset_secs >= 450 {
        floor + Duration::minutes(15)
    } else {
        floor
    }
}

/// Parse a duration: `1h30m`, `90m`, `2h`, `1:30`. Values too large to
/// count in minutes are rejected.
pub fn parse_length(s: &str) -> Option<Length> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some((h, m)) = s.split_once(':') {
        let hour: u32 = h.trim().parse().ok()?;
        let minute: u32 = m.trim().parse().ok()?;
        let total = hour.checked_mul(60)?.checked_add(minute)?;
        return Some(Length::from_minutes(total)).filter(|l| !l.is_zero());
    }

    let mut total = 0u32;
    let mut digits = String::new();
    let mut saw_unit = false;
    for c in s.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'h' | 'm' => {
                let n: u32 = digits.parse().ok()?;
                digits.clear();
                let minutes = if c == 'h' { n.checked_mul(60)? } else { n };
                total = total.checked_add(minutes)?;
                saw_unit = true;
            }
            ' ' => {}
            _ => return None,
        }
    }
    if !digits.is_empty() || !saw_unit {
        return None;
    }
    Some(Length::from_minutes(total)).filter(|l| !l.is_zero())
}

/// Format a duration as `1h30m`, `2h` or `45m`.
pub fn format_length(length: Length) -> String {
    match (length.hour, length.minute) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h{}m", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn when_display_lengths() {
        let d = When::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let t = When::DateTime(dt("2024-01-01T09:05:00"));
        assert_eq!(d.to_string(), "2024-01-01");
        assert_eq!(t.to_string(), "2024-01-01T09:05");
        assert!(is_date_only(&d.to_string()));
        assert!(!is_date_only(&t.to_string()));
        assert_eq!(t.to_string().len(), DATE_TIME_LEN);
    }

    #[test]
    fn parse_drops_seconds_and_offset() {
        assert_eq!(
            parse_when("2024-03-04T10:15:42.123+02:00").unwrap().to_string(),
            "2024-03-04T10:15"
        );
        assert_eq!(
            parse_when("2024-03-04 10:15").unwrap().to_string(),
            "2024-03-04T10:15"
        );
        assert_eq!(parse_when("2024-03-04").unwrap().to_string(), "2024-03-04");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_when("").is_none());
        assert!(parse_when("tomorrow").is_none());
        assert!(parse_when("2024-13-01").is_none());
        assert!(parse_when("2024-01-01X10:00").is_none());
        assert!(parse_when("2024-01-01T25:00").is_none());
    }

    #[test]
    fn round_to_quarter_hour() {
        assert_eq!(round_to_quarter(dt("2024-01-01T09:07:00")), dt("2024-01-01T09:00:00"));
        assert_eq!(round_to_quarter(dt("2024-01-01T09:07:30")), dt("2024-01-01T09:15:00"));
        assert_eq!(round_to_quarter(dt("2024-01-01T09:52:59")), dt("2024-01-01T10:00:00"));
        assert_eq!(round_to_quarter(dt("2024-01-01T23:53:00")), dt("2024-01-02T00:00:00"));
        assert_eq!(to_iso(dt("2024-01-01T09:07:31")), "2024-01-01T09:07");
    }

    #[test]
    fn length_forms() {
        assert_eq!(parse_length("30m"), Some(Length { hour: 0, minute: 30 }));
        assert_eq!(parse_length("1h30m"), Some(Length { hour: 1, minute: 30 }));
        assert_eq!(parse_length("90m"), Some(Length { hour: 1, minute: 30 }));
        assert_eq!(parse_length("2h"), Some(Length { hour: 2, minute: 0 }));
        assert_eq!(parse_length("1:45"), Some(Length { hour: 1, minute: 45 }));
        assert_eq!(parse_length("0m"), None);
        assert_eq!(parse_length("soon"), None);
        assert_eq!(parse_length("15"), None);
        assert_eq!(format_length(Length { hour: 1, minute: 30 }), "1h30m");
        assert_eq!(format_length(Length { hour: 2, minute: 0 }), "2h");
        assert_eq!(format_length(Length { hour: 0, minute: 5 }), "5m");
    }

    #[test]
    fn length_overflow_is_rejected() {
        assert_eq!(parse_length("99999999h"), None);
        assert_eq!(parse_length("99999999:00"), None);
        assert_eq!(parse_length("71582788h 60m"), None);
        assert_eq!(parse_length("99999999999m"), None);
        assert_eq!(
            parse_length("1000h"),
            Some(Length { hour: 1000, minute: 0 })
        );
    }

    #[test]
    fn parse_time_accepts_single_digit_hour() {
        assert_eq!(parse_time("9:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_time("09:30"), NaiveTime::from_hms_opt(9, 30, 0));
        assert!(parse_time("930").is_none());
        assert!(parse_time("24:00").is_none());
    }
}
