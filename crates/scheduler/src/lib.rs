//! Recurring-timer service scheduler.
//!
//! This crate provides:
//! - [`RecurrenceRule`]: validated interval and calendar recurrence rules
//! - `calendar`: pure next-fire-time calculation over naive local time
//! - [`ServiceTimer`]: a single-flight timer loop that drives a [`ServiceAction`]
//! - Pluggable [`ServiceLogger`] sinks and [`Clock`] sources

pub mod action;
pub mod calendar;
pub mod clock;
pub mod control;
pub mod logger;
pub mod rule;

pub use action::{FnAction, ServiceAction};
pub use calendar::{is_due, next_fire_at, until_next_fire};
pub use clock::{Clock, ShiftedClock, SystemClock};
pub use control::{ServiceStatus, ServiceTimer, ServiceTimerBuilder};
pub use logger::{FileLogger, LogLevel, ServiceLogger, TracingLogger};
pub use rule::RecurrenceRule;

pub use svctimer_core::{Result, ServiceTimerConfig, TimerConfig, TimerError, TimerMode};
