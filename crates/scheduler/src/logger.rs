//! Log sinks for timer lifecycle events and action failures.
//!
//! The scheduler reports through [`ServiceLogger`] with two levels only. The
//! default sink forwards to `tracing`; [`FileLogger`] appends to per-level
//! files in a directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Error,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Info => "info",
        }
    }
}

/// Destination for the scheduler's own log events.
pub trait ServiceLogger: Send + Sync + 'static {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards every event to `tracing` under the `svctimer` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ServiceLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => error!(target: "svctimer", "{message}"),
            LogLevel::Info => info!(target: "svctimer", "{message}"),
        }
    }
}

/// Appends one timestamped line per event to `error.log` or `info.log`.
///
/// Write failures are reported through `tracing` and otherwise ignored; a
/// broken log directory must not stop the timer.
#[derive(Debug)]
pub struct FileLogger {
    dir: PathBuf,
    // Serializes appends from concurrent timers sharing one logger.
    write_lock: Mutex<()>,
}

impl FileLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// File that receives events of `level`.
    pub fn path_for(&self, level: LogLevel) -> PathBuf {
        self.dir.join(format!("{}.log", level.as_str()))
    }

    fn append(&self, level: LogLevel, message: &str) -> std::io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(level))?;
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(file, "{stamp} [{}] {message}", level.as_str())
    }
}

impl ServiceLogger for FileLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if let Err(e) = self.append(level, message) {
            warn!(
                path = %self.path_for(level).display(),
                error = %e,
                "failed to append timer log"
            );
        }
    }
}
