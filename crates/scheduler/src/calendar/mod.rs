//! Next-fire computation for calendar recurrence rules.
//!
//! Everything here is a pure function of a [`RecurrenceRule`] and a wall-clock
//! instant: no I/O, no clock reads. Time-of-day comparisons happen at second
//! precision, and a trigger time equal to "now" counts as already passed.
//!
//! The candidate day is resolved first. If the candidate is today, the
//! earliest trigger time still ahead of now is used; any later day fires at
//! the earliest configured time.

mod days;
#[cfg(test)]
mod tests;

use std::time::Duration;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use svctimer_core::{Result, TimerError, TimerMode};

use crate::rule::RecurrenceRule;

pub use self::days::{days_in_month, days_in_year, is_leap_year};
use self::days::next_month;

/// Leap years are at most eight years apart under the Gregorian rule.
pub const LEAP_SEARCH_YEARS: i32 = 8;

/// Whether `now` falls on one of the rule's trigger instants.
///
/// Interval rules are always due; calendar rules are due when the date matches
/// the rule and the time of day (to the second) equals a trigger time.
pub fn is_due(rule: &RecurrenceRule, now: NaiveDateTime) -> bool {
    if !rule.mode().is_calendar() {
        return true;
    }
    if !rule.times().contains(&time_of_day(now)) {
        return false;
    }

    let date = now.date();
    match rule.mode() {
        TimerMode::Interval | TimerMode::Day => true,
        TimerMode::Week => date.weekday().num_days_from_sunday() == rule.day_seq(),
        TimerMode::Month => date.day() == rule.day_seq(),
        TimerMode::Year => date.ordinal() == rule.day_seq(),
        TimerMode::Date => date.month() == rule.month_seq() && date.day() == rule.day_seq(),
        TimerMode::LastDayOfMonth => date.day() == last_day_target(date.year(), date.month(), rule),
    }
}

/// The first trigger instant strictly after `now`.
pub fn next_fire_at(rule: &RecurrenceRule, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let today = now.date();
    let later_today = rule.times().iter().copied().find(|t| *t > time_of_day(now));
    let first = rule.first_time();

    let next = match rule.mode() {
        TimerMode::Interval => {
            let step = chrono::Duration::from_std(rule.poll_interval())
                .map_err(|e| TimerError::Unresolvable(format!("interval too large: {e}")))?;
            return now
                .checked_add_signed(step)
                .ok_or_else(|| out_of_range("interval"));
        }

        TimerMode::Day => match later_today {
            Some(t) => today.and_time(t),
            None => add_days(today, 1)?.and_time(first),
        },

        TimerMode::Week => {
            let weekday = today.weekday().num_days_from_sunday();
            let mut ahead = (rule.day_seq() + 7 - weekday) % 7;
            if ahead == 0 {
                if let Some(t) = later_today {
                    return Ok(today.and_time(t));
                }
                ahead = 7;
            }
            add_days(today, u64::from(ahead))?.and_time(first)
        }

        TimerMode::Month => {
            let day = rule.day_seq();
            if today.day() == day {
                if let Some(t) = later_today {
                    return Ok(today.and_time(t));
                }
            }

            let (mut year, mut month) = (today.year(), today.month());
            if today.day() >= day {
                (year, month) = next_month(year, month);
            }
            // Skip months too short for the day; never more than two in a row.
            while days_in_month(year, month) < day {
                (year, month) = next_month(year, month);
            }
            ymd(year, month, day)?.and_time(first)
        }

        TimerMode::Year => {
            let ordinal = rule.day_seq();
            if today.ordinal() == ordinal {
                if let Some(t) = later_today {
                    return Ok(today.and_time(t));
                }
            }

            let mut year = today.year();
            if today.ordinal() >= ordinal {
                year += 1;
            }
            // Day 366 only exists in leap years.
            let mut searched = 0;
            while days_in_year(year) < ordinal {
                year += 1;
                searched += 1;
                if searched > LEAP_SEARCH_YEARS {
                    return Err(no_leap_year(today.year()));
                }
            }
            NaiveDate::from_yo_opt(year, ordinal)
                .ok_or_else(|| out_of_range("year"))?
                .and_time(first)
        }

        TimerMode::Date => {
            let (month, day) = (rule.month_seq(), rule.day_seq());
            let position = (today.month(), today.day());
            if position == (month, day) {
                if let Some(t) = later_today {
                    return Ok(today.and_time(t));
                }
            }

            let mut year = today.year();
            if position >= (month, day) {
                year += 1;
            }
            if month == 2 && day == 29 {
                year = (0..LEAP_SEARCH_YEARS)
                    .map(|i| year + i)
                    .find(|y| is_leap_year(*y) && NaiveDate::from_ymd_opt(*y, 2, 29).is_some())
                    .ok_or_else(|| no_leap_year(year))?;
            }
            ymd(year, month, day)?.and_time(first)
        }

        TimerMode::LastDayOfMonth => {
            let (year, month) = (today.year(), today.month());
            let target = last_day_target(year, month, rule);
            if today.day() == target {
                if let Some(t) = later_today {
                    return Ok(today.and_time(t));
                }
            }

            if today.day() < target {
                ymd(year, month, target)?.and_time(first)
            } else {
                let (year, month) = next_month(year, month);
                ymd(year, month, last_day_target(year, month, rule))?.and_time(first)
            }
        }
    };

    Ok(next)
}

/// How long to sleep from `now` until the next trigger instant.
pub fn until_next_fire(rule: &RecurrenceRule, now: NaiveDateTime) -> Result<Duration> {
    let next = next_fire_at(rule, now)?;
    Ok(duration_between(now, next))
}

/// Non-negative wall-clock distance from `from` to `to`.
pub fn duration_between(from: NaiveDateTime, to: NaiveDateTime) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}

fn time_of_day(now: NaiveDateTime) -> NaiveTime {
    let t = now.time();
    t.with_nanosecond(0).unwrap_or(t)
}

fn last_day_target(year: i32, month: u32, rule: &RecurrenceRule) -> u32 {
    days_in_month(year, month) - rule.day_seq()
}

fn add_days(date: NaiveDate, n: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(n))
        .ok_or_else(|| out_of_range("date"))
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| TimerError::Unresolvable(format!("{year:04}-{month:02}-{day:02} is not representable")))
}

fn out_of_range(what: &str) -> TimerError {
    TimerError::Unresolvable(format!("{what} arithmetic overflowed the supported calendar range"))
}

fn no_leap_year(from: i32) -> TimerError {
    TimerError::Unresolvable(format!(
        "no leap year found within {LEAP_SEARCH_YEARS} years of {from}"
    ))
}
