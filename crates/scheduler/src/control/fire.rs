use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use svctimer_core::{Result, TimerError};
use tracing::{debug, warn};

use crate::logger::LogLevel;

use super::core::{Shared, STATUS_IDLE, STATUS_RUNNING};
use super::tick::RunControl;

/// Marks the service as running for its lifetime; resets to idle on drop,
/// including when the action errors or panics.
struct RunningGuard<'a> {
    status: &'a AtomicU8,
}

impl<'a> RunningGuard<'a> {
    fn enter(status: &'a AtomicU8) -> Self {
        status.store(STATUS_RUNNING, Ordering::Release);
        Self { status }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.status.store(STATUS_IDLE, Ordering::Release);
    }
}

/// Invoke the action once. Failures are logged through the service logger
/// and returned; callers on the timer path discard them.
///
/// Invocations are serialized on `shared.firing`: a manual `process()` that
/// lands during a timer firing waits for it. With a `gate`, the firing is
/// skipped if that run was stopped while waiting.
pub(super) async fn fire_once(shared: &Shared, gate: Option<&RunControl>) -> Result<()> {
    let _permit = shared.firing.lock().await;
    if gate.is_some_and(|g| !g.is_enabled()) {
        debug!("service timer stopped while waiting to fire");
        return Ok(());
    }
    let _running = RunningGuard::enter(&shared.status);
    let action = Arc::clone(&shared.action);
    let name = action.name().to_string();
    let started = Instant::now();

    // A separate task turns a panic into a JoinError instead of unwinding
    // through the run loop.
    let outcome = tokio::spawn(async move { action.run().await }).await;

    let result = match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TimerError::Action(e)),
        Err(join) if join.is_panic() => Err(TimerError::ActionPanicked(panic_message(join.into_panic()))),
        Err(join) => Err(TimerError::ActionPanicked(join.to_string())),
    };

    match &result {
        Ok(()) => debug!(
            action = %name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "service action completed"
        ),
        Err(e) => {
            warn!(action = %name, error = %e, "service action failed");
            shared.logger.log(LogLevel::Error, &format!("service error ({name}): {e}"));
        }
    }

    result
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
