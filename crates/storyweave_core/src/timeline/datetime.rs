//! Date/time normalization and elapsed-duration helpers.
//!
//! # Responsibility
//! - Convert heterogeneous timeline date/time text into the canonical
//!   `YYYY-MM-DD HH:MM:SS` form understood by the project format.
//! - Decompose durations into days/hours/minutes with carry.
//!
//! # Invariants
//! - All functions are pure; the same input always yields the same output.
//! - Canonical years are in `100..=9999`; everything else is unrepresentable.
//! - `ElapsedTime` always satisfies `hours < 24` and `minutes < 60`.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Marker prefix used by timelines for dates before the current era.
pub const BEFORE_ERA_MARKER: &str = "BC";

const MIN_YEAR: i64 = 100;
const MAX_YEAR: i64 = 9999;
const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors from date/time parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateTimeError {
    /// Text is not a recognizable date/time.
    InvalidFormat(String),
    /// Calendar arithmetic left the representable range.
    OutOfRange,
}

impl Display for DateTimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(value) => write!(f, "wrong date/time format: `{value}`"),
            Self::OutOfRange => write!(f, "date/time calculation out of range"),
        }
    }
}

impl Error for DateTimeError {}

/// Date/time with a four-digit year in `100..=9999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalDateTime(NaiveDateTime);

impl CanonicalDateTime {
    /// Wraps a chrono value, rejecting years outside the representable range.
    pub fn from_naive(value: NaiveDateTime) -> Option<Self> {
        let year = i64::from(value.year());
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return None;
        }
        Some(Self(value))
    }

    /// Converts seconds elapsed since `0001-01-01 00:00:00`.
    pub fn from_epoch_seconds(seconds: i64) -> Option<Self> {
        let base = NaiveDate::from_ymd_opt(1, 1, 1)?.and_hms_opt(0, 0, 0)?;
        let delta = TimeDelta::try_seconds(seconds)?;
        Self::from_naive(base.checked_add_signed(delta)?)
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Date part, `YYYY-MM-DD`.
    pub fn date_text(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// Time part, `HH:MM:SS`.
    pub fn time_text(&self) -> String {
        self.0.format("%H:%M:%S").to_string()
    }
}

impl Display for CanonicalDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

/// Normalizes timeline date/time text.
///
/// Returns `Ok(None)` for empty text and for dates outside `100..=9999`
/// (including dates marked as before the current era). A missing time of
/// day defaults to midnight; missing month/day default to the first.
///
/// # Errors
/// - `InvalidFormat` when a component is not numeric or the date does not exist.
pub fn normalize(text: &str) -> Result<Option<CanonicalDateTime>, DateTimeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.starts_with(BEFORE_ERA_MARKER) || trimmed.starts_with('-') {
        return Ok(None);
    }

    let (date_part, time_part) = match trimmed.split_once([' ', 'T']) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (trimmed, None),
    };

    let mut fields = date_part.splitn(3, '-');
    let year_text = fields.next().unwrap_or_default();
    let year = match year_text.parse::<i64>() {
        Ok(year) => year,
        // Digit runs too long for i64 are simply beyond the calendar.
        Err(_) if is_digits(year_text) => return Ok(None),
        Err(_) => return Err(DateTimeError::InvalidFormat(trimmed.to_string())),
    };
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Ok(None);
    }

    let month = parse_optional_component(fields.next(), trimmed)?.unwrap_or(1);
    let day = parse_optional_component(fields.next(), trimmed)?.unwrap_or(1);
    let date = NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| DateTimeError::InvalidFormat(trimmed.to_string()))?;

    let time = match time_part {
        Some(value) if !value.is_empty() => parse_time(value, trimmed)?,
        _ => NaiveTime::default(),
    };

    Ok(CanonicalDateTime::from_naive(NaiveDateTime::new(date, time)))
}

fn parse_time(value: &str, original: &str) -> Result<NaiveTime, DateTimeError> {
    let mut fields = value.splitn(3, ':');
    let hour = parse_optional_component(fields.next(), original)?.unwrap_or(0);
    let minute = parse_optional_component(fields.next(), original)?.unwrap_or(0);
    let second = match fields.next() {
        Some(raw) => {
            let whole = raw.split('.').next().unwrap_or_default();
            parse_optional_component(Some(whole), original)?.unwrap_or(0)
        }
        None => 0,
    };
    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| DateTimeError::InvalidFormat(original.to_string()))
}

fn parse_optional_component(raw: Option<&str>, original: &str) -> Result<Option<u32>, DateTimeError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| DateTimeError::InvalidFormat(original.to_string())),
    }
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Duration decomposed into days, hours and minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElapsedTime {
    pub days: u64,
    pub hours: u32,
    pub minutes: u32,
}

impl ElapsedTime {
    /// Builds a value from total minutes; negative totals clamp to zero.
    pub fn from_total_minutes(total: i64) -> Self {
        let total = total.max(0) as u64;
        Self {
            days: total / (24 * 60),
            hours: ((total % (24 * 60)) / 60) as u32,
            minutes: (total % 60) as u32,
        }
    }

    /// Folds unnormalized parts upward: minutes into hours, hours into days.
    pub fn folded(days: u64, hours: u64, minutes: u64) -> Self {
        let hours = hours.saturating_add(minutes / 60);
        Self {
            days: days.saturating_add(hours / 24),
            hours: (hours % 24) as u32,
            minutes: (minutes % 60) as u32,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.days == 0 && self.hours == 0 && self.minutes == 0
    }
}

/// Returns the non-negative duration between two timestamps.
///
/// Seconds are truncated; an end before the start yields zero.
pub fn elapsed(start: &CanonicalDateTime, end: &CanonicalDateTime) -> ElapsedTime {
    let delta = end.as_naive() - start.as_naive();
    ElapsedTime::from_total_minutes(delta.num_minutes())
}

/// Pre-decomposed duration as timelines store it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DurationComponents {
    pub years: i64,
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl DurationComponents {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Resolves a component duration against the start date's calendar.
///
/// Years and months are added as calendar months, so month length varies
/// with the start date; the remaining components are fixed-length.
///
/// # Errors
/// - `OutOfRange` when the arithmetic overflows the calendar.
pub fn elapsed_from_components(
    start: &CanonicalDateTime,
    components: &DurationComponents,
) -> Result<ElapsedTime, DateTimeError> {
    let base = start.as_naive();
    let total_months = components
        .years
        .checked_mul(12)
        .and_then(|months| months.checked_add(components.months))
        .ok_or(DateTimeError::OutOfRange)?;
    let shifted = shift_months(base, total_months).ok_or(DateTimeError::OutOfRange)?;

    let total_seconds = components
        .weeks
        .checked_mul(7)
        .and_then(|days| days.checked_add(components.days))
        .and_then(|days| days.checked_mul(86_400))
        .and_then(|secs| secs.checked_add(components.hours.checked_mul(3_600)?))
        .and_then(|secs| secs.checked_add(components.minutes.checked_mul(60)?))
        .and_then(|secs| secs.checked_add(components.seconds))
        .ok_or(DateTimeError::OutOfRange)?;
    let delta = TimeDelta::try_seconds(total_seconds).ok_or(DateTimeError::OutOfRange)?;
    let end = shifted
        .checked_add_signed(delta)
        .ok_or(DateTimeError::OutOfRange)?;

    Ok(ElapsedTime::from_total_minutes((end - base).num_minutes()))
}

fn shift_months(value: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        value.checked_add_months(Months::new(magnitude))
    } else {
        value.checked_sub_months(Months::new(magnitude))
    }
}
