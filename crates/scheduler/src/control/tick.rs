//! The armed/firing loop behind a started [`ServiceTimer`](super::ServiceTimer).
//!
//! Invariant: at most one outstanding deadline. The loop sleeps on exactly one
//! deadline, and nothing is re-armed until the firing has finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use svctimer_core::Result;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::calendar::{duration_between, is_due, next_fire_at};
use crate::logger::LogLevel;
use crate::rule::RecurrenceRule;

use super::core::{lock, Shared};
use super::fire::fire_once;

/// Per-run enable flag plus the signal that cuts an armed sleep short.
pub(super) struct RunControl {
    enabled: AtomicBool,
    wake: Notify,
}

impl RunControl {
    pub(super) fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            wake: Notify::new(),
        }
    }

    pub(super) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns `true` if this call flipped the run from enabled to disabled.
    pub(super) fn disable(&self) -> bool {
        let was_enabled = self.enabled.swap(false, Ordering::AcqRel);
        // notify_one stores a permit, so a loop busy firing still sees it.
        self.wake.notify_one();
        was_enabled
    }
}

enum Wake {
    Elapsed,
    Stopped,
}

/// Run until the control is disabled or the next deadline cannot be computed.
pub(super) async fn run_loop(
    shared: Arc<Shared>,
    rule: RecurrenceRule,
    control: Arc<RunControl>,
    previous: Option<JoinHandle<()>>,
    mut delay: Duration,
    deadline: Option<NaiveDateTime>,
) {
    if let Some(previous) = previous {
        let waiting = Instant::now();
        let _ = previous.await;
        // The old loop clears the deadline on its way out.
        shared.set_deadline(deadline);
        // Its last firing may have run well into our delay.
        delay = match deadline {
            Some(d) => duration_between(shared.clock.now(), d),
            None => delay.saturating_sub(waiting.elapsed()),
        };
        debug!(delay_ms = delay.as_millis() as u64, "previous run finished, re-armed");
    }

    loop {
        // Armed.
        let woke = tokio::select! {
            _ = tokio::time::sleep(delay) => Wake::Elapsed,
            _ = control.wake.notified() => Wake::Stopped,
        };
        if matches!(woke, Wake::Stopped) || !control.is_enabled() {
            debug!("service timer disarmed");
            break;
        }

        // Firing: no deadline is armed until the action has returned.
        let now = shared.clock.now();
        let armed = *lock(&shared.deadline);
        if tick_is_due(&rule, now, armed) {
            let _ = fire_once(&shared, Some(control.as_ref())).await;
        } else {
            debug!(now = %now, "stale tick, re-arming without firing");
        }

        if !control.is_enabled() {
            break;
        }

        match next_delay(&shared, &rule) {
            Ok(next) => delay = next,
            Err(e) => {
                error!(error = %e, "cannot compute next deadline, stopping timer");
                shared
                    .logger
                    .log(LogLevel::Error, &format!("service timer stopped: {e}"));
                break;
            }
        }
    }

    control.disable();
    shared.set_deadline(None);
}

/// A calendar tick is due when `now` is a trigger instant or has reached the
/// armed deadline, so a wake-up that lands a little late still fires.
pub(super) fn tick_is_due(rule: &RecurrenceRule, now: NaiveDateTime, deadline: Option<NaiveDateTime>) -> bool {
    if !rule.mode().is_calendar() {
        return true;
    }
    is_due(rule, now) || deadline.is_some_and(|d| now >= d)
}

/// Re-arm after a tick: the fixed period for interval rules, otherwise the
/// distance to the next calendar deadline (cached for `next_deadline()`).
fn next_delay(shared: &Shared, rule: &RecurrenceRule) -> Result<Duration> {
    if !rule.mode().is_calendar() {
        return Ok(rule.poll_interval());
    }
    let now = shared.clock.now();
    let next = next_fire_at(rule, now)?;
    shared.set_deadline(Some(next));
    debug!(next = %next, "service timer re-armed");
    Ok(duration_between(now, next))
}
