//! Wall-clock sources for the scheduler.

use std::time::Instant;

use chrono::{Local, NaiveDateTime};

/// Source of "now" for deciding whether a tick is due.
///
/// Times are naive local wall-clock values; no timezone conversion happens
/// anywhere in the scheduler.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that starts at a chosen instant and then advances in real time.
///
/// Used for dry runs (`timer-worker --start-at`) and for driving calendar
/// rules in tests without waiting for the real trigger time.
#[derive(Debug, Clone)]
pub struct ShiftedClock {
    origin: NaiveDateTime,
    started: Instant,
}

impl ShiftedClock {
    pub fn starting_at(origin: NaiveDateTime) -> Self {
        Self {
            origin,
            started: Instant::now(),
        }
    }
}

impl Clock for ShiftedClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = chrono::Duration::from_std(self.started.elapsed()).unwrap_or(chrono::Duration::zero());
        self.origin.checked_add_signed(elapsed).unwrap_or(NaiveDateTime::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifted_clock_advances_from_origin() {
        let origin = NaiveDateTime::parse_from_str("2024-03-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let clock = ShiftedClock::starting_at(origin);
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = clock.now();
        assert!(first >= origin);
        assert!(second > first);
        assert!(second - origin < chrono::Duration::seconds(5));
    }
}
