//! [`ServiceTimer`] — construction, start/stop and status queries.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDateTime;
use svctimer_core::{Result, TimerConfig, TimerError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::action::ServiceAction;
use crate::calendar::{duration_between, next_fire_at};
use crate::clock::{Clock, SystemClock};
use crate::logger::{LogLevel, ServiceLogger, TracingLogger};
use crate::rule::RecurrenceRule;

use super::fire::fire_once;
use super::tick::{run_loop, RunControl};

pub(super) const STATUS_IDLE: u8 = 0;
pub(super) const STATUS_RUNNING: u8 = 1;

/// Whether the service action is executing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Idle,
    Running,
}

/// State shared between the public handle and the run loop.
pub(super) struct Shared {
    pub(super) status: AtomicU8,
    pub(super) deadline: Mutex<Option<NaiveDateTime>>,
    /// Held for the whole of one action invocation.
    pub(super) firing: tokio::sync::Mutex<()>,
    pub(super) action: Arc<dyn ServiceAction>,
    pub(super) logger: Arc<dyn ServiceLogger>,
    pub(super) clock: Arc<dyn Clock>,
}

impl Shared {
    pub(super) fn set_deadline(&self, deadline: Option<NaiveDateTime>) {
        *lock(&self.deadline) = deadline;
    }
}

/// One started run: its own enabled flag, wake-up signal and loop task.
struct Run {
    control: Arc<RunControl>,
    task: JoinHandle<()>,
}

/// Drives a service action from a single recurring timer.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use svctimer::{FnAction, ServiceTimer};
/// # use svctimer_core::{TimerConfig, TimerMode};
/// # async fn demo() -> svctimer_core::Result<()> {
/// let config = TimerConfig::new(TimerMode::Day).with_times(["02:00"]);
/// let timer = ServiceTimer::new(config, Arc::new(FnAction::new("nightly", || Ok(()))));
/// timer.start()?;
/// // ...
/// timer.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct ServiceTimer {
    config: TimerConfig,
    shared: Arc<Shared>,
    rule: Mutex<Option<RecurrenceRule>>,
    run: Mutex<Option<Run>>,
}

/// Builder for [`ServiceTimer`] with optional logger and clock overrides.
pub struct ServiceTimerBuilder {
    config: TimerConfig,
    action: Arc<dyn ServiceAction>,
    logger: Arc<dyn ServiceLogger>,
    clock: Arc<dyn Clock>,
}

impl ServiceTimerBuilder {
    pub fn logger(mut self, logger: Arc<dyn ServiceLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> ServiceTimer {
        ServiceTimer {
            config: self.config,
            shared: Arc::new(Shared {
                status: AtomicU8::new(STATUS_IDLE),
                deadline: Mutex::new(None),
                firing: tokio::sync::Mutex::new(()),
                action: self.action,
                logger: self.logger,
                clock: self.clock,
            }),
            rule: Mutex::new(None),
            run: Mutex::new(None),
        }
    }
}

impl ServiceTimer {
    /// Timer with the default `tracing` logger and the system clock.
    pub fn new(config: TimerConfig, action: Arc<dyn ServiceAction>) -> Self {
        Self::builder(config, action).build()
    }

    pub fn builder(config: TimerConfig, action: Arc<dyn ServiceAction>) -> ServiceTimerBuilder {
        ServiceTimerBuilder {
            config,
            action,
            logger: Arc::new(TracingLogger),
            clock: Arc::new(SystemClock),
        }
    }

    /// Validate the config, arm the first deadline and spawn the run loop.
    ///
    /// Must be called from inside a tokio runtime. Configuration and
    /// calculation errors are returned (and logged); nothing is armed then.
    pub fn start(&self) -> Result<()> {
        let mut run = lock(&self.run);
        if run.as_ref().is_some_and(|r| r.control.is_enabled()) {
            return Err(TimerError::AlreadyStarted);
        }

        let prepared = tokio::runtime::Handle::try_current()
            .map_err(|_| TimerError::NoRuntime)
            .and_then(|runtime| Ok((runtime, self.arm_first()?)));
        let (runtime, (rule, delay, deadline)) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.shared
                    .logger
                    .log(LogLevel::Error, &format!("service timer failed to start: {e}"));
                return Err(e);
            }
        };

        // A stopped run may still be finishing its last firing; the new loop
        // waits for it so two actions never overlap.
        let previous = run.take().map(|r| r.task);
        let control = Arc::new(RunControl::new());

        self.shared.set_deadline(deadline);
        *lock(&self.rule) = Some(rule.clone());

        info!(
            mode = %rule.mode(),
            delay_ms = delay.as_millis() as u64,
            deadline = ?deadline,
            "service timer armed"
        );

        let task = runtime.spawn(run_loop(
            Arc::clone(&self.shared),
            rule,
            Arc::clone(&control),
            previous,
            delay,
            deadline,
        ));
        *run = Some(Run { control, task });

        self.shared.logger.log(LogLevel::Info, "service timer started");
        Ok(())
    }

    /// Suppress further firings and disarm the timer. Idempotent; a firing
    /// already in progress is allowed to finish.
    pub fn stop(&self) {
        let run = lock(&self.run);
        if let Some(r) = run.as_ref() {
            if r.control.disable() {
                self.shared.logger.log(LogLevel::Info, "service timer stopped");
            }
        }
        self.shared.set_deadline(None);
    }

    /// Stop and wait for the run loop (including any in-flight firing) to end.
    pub async fn shutdown(&self) {
        self.stop();
        let task = lock(&self.run).take().map(|r| r.task);
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "service timer loop ended abnormally");
            }
        }
    }

    /// Run the action once right now, bypassing the timer. Failures are
    /// logged and swallowed, as on the timer path. Waits for a timer firing
    /// that is already in progress.
    pub async fn process(&self) {
        let _ = fire_once(&self.shared, None).await;
    }

    /// Like [`process`](Self::process) but hands the contained error back.
    pub async fn process_checked(&self) -> Result<()> {
        fire_once(&self.shared, None).await
    }

    pub fn status(&self) -> ServiceStatus {
        match self.shared.status.load(Ordering::Acquire) {
            STATUS_RUNNING => ServiceStatus::Running,
            _ => ServiceStatus::Idle,
        }
    }

    /// Whether a started run is still allowed to fire.
    pub fn is_enabled(&self) -> bool {
        lock(&self.run).as_ref().is_some_and(|r| r.control.is_enabled())
    }

    /// Cached next calendar deadline; `None` for interval timers or when stopped.
    pub fn next_deadline(&self) -> Option<NaiveDateTime> {
        *lock(&self.shared.deadline)
    }

    /// The rule validated by the most recent successful `start()`.
    pub fn rule(&self) -> Option<RecurrenceRule> {
        lock(&self.rule).clone()
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    fn arm_first(&self) -> Result<(RecurrenceRule, std::time::Duration, Option<NaiveDateTime>)> {
        let rule = RecurrenceRule::from_config(&self.config)?;
        if !rule.mode().is_calendar() {
            let delay = rule.initial_delay();
            return Ok((rule, delay, None));
        }
        let now = self.shared.clock.now();
        let next = next_fire_at(&rule, now)?;
        Ok((rule, duration_between(now, next), Some(next)))
    }
}

impl Drop for ServiceTimer {
    fn drop(&mut self) {
        if let Some(run) = lock(&self.run).as_ref() {
            run.control.disable();
        }
    }
}

/// Lock a std mutex, recovering the data if a panicking holder poisoned it.
pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
