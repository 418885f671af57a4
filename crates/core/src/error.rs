use thiserror::Error;

/// Result alias used across the timer crates.
pub type Result<T> = std::result::Result<T, TimerError>;

#[derive(Error, Debug)]
pub enum TimerError {
    /// A timer config field is missing, malformed, or out of range for its mode.
    #[error("configuration error in `{field}`: {message}")]
    Configuration { field: &'static str, message: String },

    /// The calculator could not resolve a deadline for an otherwise valid rule.
    #[error("cannot resolve next fire time: {0}")]
    Unresolvable(String),

    #[error("timer is already started; call stop() first")]
    AlreadyStarted,

    #[error("no tokio runtime available to drive the timer")]
    NoRuntime,

    /// The service action returned an error during one firing.
    #[error("service action failed: {0:#}")]
    Action(#[source] anyhow::Error),

    #[error("service action panicked: {0}")]
    ActionPanicked(String),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl TimerError {
    pub fn config(field: &'static str, message: impl Into<String>) -> Self {
        TimerError::Configuration {
            field,
            message: message.into(),
        }
    }

    /// Whether this error must abort `start()` instead of being logged and skipped.
    ///
    /// Action failures are contained per firing; everything else points at a
    /// config or programming defect.
    pub fn is_fatal(&self) -> bool {
        match self {
            TimerError::Action(_) | TimerError::ActionPanicked(_) => false,
            TimerError::Configuration { .. }
            | TimerError::Unresolvable(_)
            | TimerError::AlreadyStarted
            | TimerError::NoRuntime
            | TimerError::ConfigIo(_)
            | TimerError::ConfigParse(_) => true,
        }
    }
}
