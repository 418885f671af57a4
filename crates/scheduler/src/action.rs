//! The business action a timer invokes on each due tick.

use async_trait::async_trait;

/// Work performed once per firing.
///
/// Errors are contained by the scheduler: they are logged and the schedule
/// carries on from the next deadline.
#[async_trait]
pub trait ServiceAction: Send + Sync + 'static {
    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "service"
    }

    async fn run(&self) -> anyhow::Result<()>;
}

/// Adapts a synchronous closure into a [`ServiceAction`].
///
/// The closure runs on the runtime thread that delivered the tick, so keep it
/// short or move blocking work elsewhere.
pub struct FnAction<F> {
    name: String,
    f: F,
}

impl<F> FnAction<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> ServiceAction for FnAction<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> anyhow::Result<()> {
        (self.f)()
    }
}
