//! Date and time values.
//!
//! - [`Date`]: days since 1970-01-01 (proleptic Gregorian)
//! - [`TimeOfDay`]: nanoseconds since midnight
//! - [`TimePoint`]: seconds since the epoch plus nanoseconds
//!
//! Values of `WITH TIME ZONE` types are held normalized to UTC; the zone
//! offset only matters when parsing, formatting and casting.

use std::fmt;

use thiserror::Error;

/// Nanoseconds per second.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Seconds per day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Nanoseconds per day.
pub const NANOS_PER_DAY: u64 = SECONDS_PER_DAY as u64 * NANOS_PER_SECOND;

/// Largest accepted zone offset in minutes (±24:00 exclusive).
pub const MAX_OFFSET_MINUTES: i32 = 24 * 60 - 1;

/// Malformed or out-of-range temporal input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} literal '{text}'")]
pub struct TemporalParseError {
    /// What was being parsed.
    pub kind: &'static str,
    /// The rejected text.
    pub text: String,
}

fn parse_err(kind: &'static str, text: &str) -> TemporalParseError {
    TemporalParseError {
        kind,
        text: text.to_string(),
    }
}

/// Days since the epoch for a civil date.
#[must_use]
pub fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = i64::from(month);
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Civil date for days since the epoch.
#[must_use]
pub fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        _ => 0,
    }
}

fn parse_number<T: std::str::FromStr>(s: &str, max_len: usize) -> Option<T> {
    if s.is_empty() || s.len() > max_len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// A calendar date.
///
/// ```rust
/// use jogasaki_sql::data::Date;
///
/// let d: Date = "2024-02-29".parse().unwrap();
/// assert_eq!(d.to_string(), "2024-02-29");
/// assert_eq!(Date::from_days(0).to_string(), "1970-01-01");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Date(i64);

impl Date {
    /// Creates a date from days since the epoch.
    #[inline]
    #[must_use]
    pub const fn from_days(days: i64) -> Self {
        Self(days)
    }

    /// Creates a date from its civil components.
    #[must_use]
    pub fn from_ymd(year: i64, month: u32, day: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
            return None;
        }
        Some(Self(days_from_civil(year, month, day)))
    }

    /// Days since the epoch.
    #[inline]
    #[must_use]
    pub const fn days(self) -> i64 {
        self.0
    }

    /// Civil components `(year, month, day)`.
    #[must_use]
    pub fn ymd(self) -> (i64, u32, u32) {
        civil_from_days(self.0)
    }
}

impl std::str::FromStr for Date {
    type Err = TemporalParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let s = text.trim();
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mut parts = body.splitn(3, '-');
        let (Some(y), Some(m), Some(d)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(parse_err("date", text));
        };
        let year: i64 = parse_number(y, 9).ok_or_else(|| parse_err("date", text))?;
        let month: u32 = parse_number(m, 2).ok_or_else(|| parse_err("date", text))?;
        let day: u32 = parse_number(d, 2).ok_or_else(|| parse_err("date", text))?;
        let year = if negative { -year } else { year };
        Date::from_ymd(year, month, day).ok_or_else(|| parse_err("date", text))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (y, m, d) = self.ymd();
        if y < 0 {
            write!(f, "-{:04}-{m:02}-{d:02}", -y)
        } else {
            write!(f, "{y:04}-{m:02}-{d:02}")
        }
    }
}

/// A time of day with nanosecond resolution.
///
/// ```rust
/// use jogasaki_sql::data::TimeOfDay;
///
/// let t: TimeOfDay = "12:34:56.5".parse().unwrap();
/// assert_eq!(t.to_string(), "12:34:56.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeOfDay(u64);

impl TimeOfDay {
    /// Creates a time from nanoseconds since midnight, wrapping at one day.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos % NANOS_PER_DAY)
    }

    /// Creates a time from its components.
    #[must_use]
    pub fn from_hms_nano(hour: u32, minute: u32, second: u32, nanos: u32) -> Option<Self> {
        if hour > 23 || minute > 59 || second > 59 || u64::from(nanos) >= NANOS_PER_SECOND {
            return None;
        }
        let secs = u64::from(hour) * 3600 + u64::from(minute) * 60 + u64::from(second);
        Some(Self(secs * NANOS_PER_SECOND + u64::from(nanos)))
    }

    /// Nanoseconds since midnight.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Shifts by `minutes`, wrapping around midnight.
    #[must_use]
    pub fn shift_minutes(self, minutes: i32) -> Self {
        let delta = i128::from(minutes) * 60 * i128::from(NANOS_PER_SECOND);
        let day = i128::from(NANOS_PER_DAY);
        Self(((i128::from(self.0) + delta).rem_euclid(day)) as u64)
    }
}

fn parse_fraction(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 9 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{s:0<9}");
    padded.parse().ok()
}

fn write_fraction(f: &mut fmt::Formatter<'_>, nanos: u32) -> fmt::Result {
    if nanos == 0 {
        return Ok(());
    }
    let digits = format!("{nanos:09}");
    write!(f, ".{}", digits.trim_end_matches('0'))
}

fn parse_time_part(text: &str, s: &str) -> Result<TimeOfDay, TemporalParseError> {
    let err = || parse_err("time", text);
    let (hms, frac) = match s.split_once('.') {
        Some((hms, frac)) => (hms, Some(frac)),
        None => (s, None),
    };
    let mut parts = hms.split(':');
    let hour: u32 = parts.next().and_then(|p| parse_number(p, 2)).ok_or_else(err)?;
    let minute: u32 = parts.next().and_then(|p| parse_number(p, 2)).ok_or_else(err)?;
    let second: u32 = match parts.next() {
        Some(p) => parse_number(p, 2).ok_or_else(err)?,
        None => 0,
    };
    if parts.next().is_some() {
        return Err(err());
    }
    let nanos = match frac {
        Some(f) => parse_fraction(f).ok_or_else(err)?,
        None => 0,
    };
    TimeOfDay::from_hms_nano(hour, minute, second, nanos).ok_or_else(err)
}

/// Splits a trailing zone designator (`Z`, `+HH:MM`, `-HH:MM`, `+HH`).
fn split_offset(s: &str) -> Result<(&str, Option<i32>), ()> {
    if let Some(rest) = s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        return Ok((rest, Some(0)));
    }
    let Some(pos) = s.rfind(['+', '-']) else {
        return Ok((s, None));
    };
    // a '-' inside the date part is not an offset
    if !s[..pos].contains(':') {
        return Ok((s, None));
    }
    let (body, zone) = s.split_at(pos);
    let negative = zone.starts_with('-');
    let zone = &zone[1..];
    let (h, m) = match zone.split_once(':') {
        Some((h, m)) => (h, m),
        None if zone.len() == 4 => zone.split_at(2),
        None => (zone, "0"),
    };
    let hours: i32 = parse_number(h, 2).ok_or(())?;
    let minutes: i32 = parse_number(m, 2).ok_or(())?;
    if minutes > 59 {
        return Err(());
    }
    let offset = hours * 60 + minutes;
    if offset > MAX_OFFSET_MINUTES {
        return Err(());
    }
    Ok((body.trim_end(), Some(if negative { -offset } else { offset })))
}

/// Parses a time literal with an optional zone offset; returns the local
/// time and the offset in minutes.
pub fn parse_time_with_offset(text: &str) -> Result<(TimeOfDay, Option<i32>), TemporalParseError> {
    let (body, offset) = split_offset(text.trim()).map_err(|_| parse_err("time", text))?;
    Ok((parse_time_part(text, body)?, offset))
}

impl std::str::FromStr for TimeOfDay {
    type Err = TemporalParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        parse_time_part(text, text.trim())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0 / NANOS_PER_SECOND;
        let nanos = (self.0 % NANOS_PER_SECOND) as u32;
        write!(
            f,
            "{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        )?;
        write_fraction(f, nanos)
    }
}

/// A point in time with nanosecond resolution.
///
/// ```rust
/// use jogasaki_sql::data::TimePoint;
///
/// let tp: TimePoint = "1970-01-02 00:00:01.25".parse().unwrap();
/// assert_eq!(tp.seconds(), 86_401);
/// assert_eq!(tp.subsecond_nanos(), 250_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimePoint {
    seconds: i64,
    nanos: u32,
}

impl TimePoint {
    /// Creates a time point; `nanos` carries into seconds.
    #[must_use]
    pub const fn new(seconds: i64, nanos: u32) -> Self {
        Self {
            seconds: seconds + (nanos as u64 / NANOS_PER_SECOND) as i64,
            nanos: (nanos as u64 % NANOS_PER_SECOND) as u32,
        }
    }

    /// Seconds since the epoch.
    #[inline]
    #[must_use]
    pub const fn seconds(self) -> i64 {
        self.seconds
    }

    /// Nanoseconds within the second.
    #[inline]
    #[must_use]
    pub const fn subsecond_nanos(self) -> u32 {
        self.nanos
    }

    /// Combines a date and a time of day.
    #[must_use]
    pub fn from_date_time(date: Date, time: TimeOfDay) -> Self {
        let secs = (time.nanos() / NANOS_PER_SECOND) as i64;
        let nanos = (time.nanos() % NANOS_PER_SECOND) as u32;
        Self {
            seconds: date.days() * SECONDS_PER_DAY + secs,
            nanos,
        }
    }

    /// The date part.
    #[must_use]
    pub fn date(self) -> Date {
        Date::from_days(self.seconds.div_euclid(SECONDS_PER_DAY))
    }

    /// The time-of-day part.
    #[must_use]
    pub fn time_of_day(self) -> TimeOfDay {
        let secs = self.seconds.rem_euclid(SECONDS_PER_DAY) as u64;
        TimeOfDay::from_nanos(secs * NANOS_PER_SECOND + u64::from(self.nanos))
    }

    /// Shifts by `minutes`.
    #[must_use]
    pub fn shift_minutes(self, minutes: i32) -> Self {
        Self {
            seconds: self.seconds + i64::from(minutes) * 60,
            nanos: self.nanos,
        }
    }
}

/// Parses a timestamp literal with an optional zone offset; returns the local
/// time point and the offset in minutes.
pub fn parse_time_point_with_offset(
    text: &str,
) -> Result<(TimePoint, Option<i32>), TemporalParseError> {
    let err = || parse_err("timestamp", text);
    let s = text.trim();
    let (date_part, rest) = match s.find(['T', 't', ' ']) {
        Some(pos) => (&s[..pos], Some(s[pos + 1..].trim_start())),
        None => (s, None),
    };
    let date: Date = date_part.parse().map_err(|_| err())?;
    let (time, offset) = match rest {
        Some(r) => {
            let (body, offset) = split_offset(r).map_err(|_| err())?;
            (parse_time_part(text, body).map_err(|_| err())?, offset)
        }
        None => (TimeOfDay::default(), None),
    };
    Ok((TimePoint::from_date_time(date, time), offset))
}

impl std::str::FromStr for TimePoint {
    type Err = TemporalParseError;

    /// Parses a timestamp; an offset, if present, is applied to yield UTC.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (tp, offset) = parse_time_point_with_offset(text)?;
        Ok(tp.shift_minutes(-offset.unwrap_or(0)))
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.date())?;
        let t = self.time_of_day();
        let secs = t.nanos() / NANOS_PER_SECOND;
        write!(
            f,
            "{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        )?;
        write_fraction(f, self.nanos)
    }
}

/// Formats a zone offset as `+HH:MM`.
#[must_use]
pub fn format_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let m = minutes.unsigned_abs();
    format!("{sign}{:02}:{:02}", m / 60, m % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_civil_conversion() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(2000, 3, 1), 11_017);
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
        for days in [-800_000, -1, 0, 59, 60, 11_016, 2_932_896] {
            let (y, m, d) = civil_from_days(days);
            assert_eq!(days_from_civil(y, m, d), days);
        }
    }

    #[test]
    fn test_date_parse() {
        assert_eq!("1970-01-02".parse::<Date>().unwrap().days(), 1);
        assert!("2023-02-29".parse::<Date>().is_err());
        assert!("2023-13-01".parse::<Date>().is_err());
        assert!("2023/01/01".parse::<Date>().is_err());
        assert_eq!("-0001-01-01".parse::<Date>().unwrap().ymd(), (-1, 1, 1));
    }

    #[test]
    fn test_time_parse_and_format() {
        let t: TimeOfDay = "23:59:59.999999999".parse().unwrap();
        assert_eq!(t.nanos(), NANOS_PER_DAY - 1);
        assert_eq!(t.to_string(), "23:59:59.999999999");
        assert_eq!("01:02".parse::<TimeOfDay>().unwrap().to_string(), "01:02:00");
        assert!("24:00:00".parse::<TimeOfDay>().is_err());
        assert!("12:00:00.1234567890".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_time_with_offset() {
        let (t, offset) = parse_time_with_offset("10:00:00+09:00").unwrap();
        assert_eq!(offset, Some(540));
        assert_eq!(t.shift_minutes(-540).to_string(), "01:00:00");
        let (_, offset) = parse_time_with_offset("10:00:00Z").unwrap();
        assert_eq!(offset, Some(0));
        assert_eq!(format_offset(-330), "-05:30");
    }

    #[test]
    fn test_time_point_parse() {
        let tp: TimePoint = "2020-01-01 09:00:00+09:00".parse().unwrap();
        assert_eq!(tp.to_string(), "2020-01-01 00:00:00");
        let tp: TimePoint = "1969-12-31T23:59:59.5".parse().unwrap();
        assert_eq!(tp.seconds(), -1);
        assert_eq!(tp.subsecond_nanos(), 500_000_000);
        assert_eq!(tp.to_string(), "1969-12-31 23:59:59.5");
        let tp: TimePoint = "2000-01-01".parse().unwrap();
        assert_eq!(tp.time_of_day(), TimeOfDay::default());
    }

    #[test]
    fn test_time_point_ordering() {
        let a = TimePoint::new(-1, 999_999_999);
        let b = TimePoint::new(0, 0);
        assert!(a < b);
        assert_eq!(TimePoint::new(0, 1_500_000_000), TimePoint::new(1, 500_000_000));
    }
}
