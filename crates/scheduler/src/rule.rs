//! [`RecurrenceRule`] — a validated, immutable description of when to fire.
//!
//! Rules are built from a [`TimerConfig`] (or one of the typed constructors)
//! and checked up front; the calculator in [`crate::calendar`] assumes every
//! field is already within range for its mode.

use std::time::Duration;

use chrono::{NaiveTime, Timelike};
use svctimer_core::{Result, TimerConfig, TimerError, TimerMode};

use crate::calendar::days_in_month;

/// Leap reference year used to validate `Date` rules, so Feb 29 is accepted.
const LEAP_REFERENCE_YEAR: i32 = 2012;

/// Largest "days before last" offset; every month has at least 28 days.
const MAX_LAST_DAY_OFFSET: i32 = 28;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    mode: TimerMode,
    day_seq: u32,
    month_seq: u32,
    times: Vec<NaiveTime>,
    interval: Duration,
    delay: Duration,
}

impl RecurrenceRule {
    /// Validate a config entry and build a rule from it.
    pub fn from_config(config: &TimerConfig) -> Result<Self> {
        let times = config.parsed_times()?;
        Self::build(
            config.mode,
            config.day_seq,
            config.month_seq,
            times,
            config.interval(),
            config.delay(),
        )
    }

    /// Fixed-period polling, first firing after `delay`.
    pub fn interval(interval: Duration, delay: Duration) -> Result<Self> {
        Self::build(TimerMode::Interval, 0, 0, Vec::new(), interval, delay)
    }

    pub fn daily(times: Vec<NaiveTime>) -> Result<Self> {
        Self::calendar(TimerMode::Day, 0, 0, times)
    }

    /// `weekday` counts from Sunday = 0.
    pub fn weekly(weekday: i32, times: Vec<NaiveTime>) -> Result<Self> {
        Self::calendar(TimerMode::Week, weekday, 0, times)
    }

    pub fn monthly(day: i32, times: Vec<NaiveTime>) -> Result<Self> {
        Self::calendar(TimerMode::Month, day, 0, times)
    }

    pub fn yearly(day_of_year: i32, times: Vec<NaiveTime>) -> Result<Self> {
        Self::calendar(TimerMode::Year, day_of_year, 0, times)
    }

    pub fn date(month: i32, day: i32, times: Vec<NaiveTime>) -> Result<Self> {
        Self::calendar(TimerMode::Date, day, month, times)
    }

    /// `days_before` of 0 or 1 both mean the last day; 2 is the day before it.
    pub fn last_day_of_month(days_before: i32, times: Vec<NaiveTime>) -> Result<Self> {
        Self::calendar(TimerMode::LastDayOfMonth, days_before, 0, times)
    }

    fn calendar(mode: TimerMode, day_seq: i32, month_seq: i32, times: Vec<NaiveTime>) -> Result<Self> {
        Self::build(mode, day_seq, month_seq, times, Duration::ZERO, Duration::ZERO)
    }

    fn build(
        mode: TimerMode,
        day_seq: i32,
        month_seq: i32,
        times: Vec<NaiveTime>,
        interval: Duration,
        delay: Duration,
    ) -> Result<Self> {
        let (day_seq, month_seq) = validate(mode, day_seq, month_seq, interval)?;
        Ok(Self {
            mode,
            day_seq,
            month_seq,
            times: normalize_times(times),
            interval,
            delay,
        })
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    /// Mode-specific day number. For `LastDayOfMonth` this is already the
    /// zero-based count of days before the last day.
    pub fn day_seq(&self) -> u32 {
        self.day_seq
    }

    pub fn month_seq(&self) -> u32 {
        self.month_seq
    }

    /// Sorted, de-duplicated trigger times at second precision. Never empty:
    /// a rule configured without times fires at midnight.
    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    /// Earliest trigger time of the day.
    pub fn first_time(&self) -> NaiveTime {
        self.times.first().copied().unwrap_or(NaiveTime::MIN)
    }

    pub fn poll_interval(&self) -> Duration {
        self.interval
    }

    pub fn initial_delay(&self) -> Duration {
        self.delay
    }
}

impl TryFrom<&TimerConfig> for RecurrenceRule {
    type Error = TimerError;

    fn try_from(config: &TimerConfig) -> Result<Self> {
        Self::from_config(config)
    }
}

fn validate(mode: TimerMode, day_seq: i32, month_seq: i32, interval: Duration) -> Result<(u32, u32)> {
    match mode {
        TimerMode::Interval => {
            if interval.is_zero() {
                return Err(TimerError::config(
                    "interval_ms",
                    "must be greater than 0 for interval mode",
                ));
            }
            Ok((0, 0))
        }
        TimerMode::Day => Ok((0, 0)),
        TimerMode::Week => in_range("day_seq", day_seq, 0, 6, "week mode (0 = Sunday)").map(|d| (d, 0)),
        TimerMode::Month => in_range("day_seq", day_seq, 1, 31, "month mode").map(|d| (d, 0)),
        TimerMode::Year => in_range("day_seq", day_seq, 1, 366, "year mode").map(|d| (d, 0)),
        TimerMode::Date => {
            let month = in_range("month_seq", month_seq, 1, 12, "date mode")?;
            let last = days_in_month(LEAP_REFERENCE_YEAR, month) as i32;
            let day = in_range("day_seq", day_seq, 1, last, &format!("month {month} in date mode"))?;
            Ok((day, month))
        }
        TimerMode::LastDayOfMonth => {
            let offset = in_range("day_seq", day_seq, 0, MAX_LAST_DAY_OFFSET, "last_day_of_month mode")?;
            // 1 is "the last day", same as 0; store as days-before-last.
            Ok((offset.saturating_sub(1), 0))
        }
    }
}

fn in_range(field: &'static str, value: i32, min: i32, max: i32, context: &str) -> Result<u32> {
    if value < min || value > max {
        return Err(TimerError::config(
            field,
            format!("must be within {min}..={max} for {context}, got {value}"),
        ));
    }
    Ok(value as u32)
}

fn normalize_times(times: Vec<NaiveTime>) -> Vec<NaiveTime> {
    let mut times: Vec<NaiveTime> = times
        .into_iter()
        .map(|t| t.with_nanosecond(0).unwrap_or(t))
        .collect();
    times.sort_unstable();
    times.dedup();
    if times.is_empty() {
        times.push(NaiveTime::MIN);
    }
    times
}
