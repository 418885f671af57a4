//! timer-worker — runs a command (or a heartbeat) on a recurring timer.
//!
//! Loads a named timer profile from a TOML file, then drives the action from a
//! [`ServiceTimer`] until Ctrl-C:
//!
//! ```text
//! timer-worker --config config/timers.toml --name nightly -- ./backup.sh --full
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use clap::Parser;
use tracing::{info, warn};

use svctimer::{
    FileLogger, ServiceAction, ServiceLogger, ServiceTimer, ServiceTimerConfig, ShiftedClock,
    TracingLogger,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Recurring-timer worker.
#[derive(Parser, Debug)]
#[command(name = "timer-worker", version, about)]
struct Cli {
    /// Path to the timers TOML file. Without it, `SVCTIMER_CONFIG` (or
    /// config/timers.toml) is read and `SVCTIMER_PROFILE` overrides the default.
    #[arg(long)]
    config: Option<String>,

    /// Timer profile to use (defaults to the file's `default`, then the first entry).
    #[arg(long)]
    name: Option<String>,

    /// Write error.log / info.log into this directory instead of stdout only.
    #[arg(long, env = "SVCTIMER_LOG_DIR")]
    log_dir: Option<String>,

    /// Run the action once and exit.
    #[arg(long)]
    once: bool,

    /// Pretend the wall clock starts at this local time ("YYYY-MM-DD HH:MM:SS").
    #[arg(long, value_parser = parse_start_at)]
    start_at: Option<NaiveDateTime>,

    /// Command to run on every firing.
    #[arg(last = true)]
    command: Vec<String>,
}

fn parse_start_at(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| format!("expected YYYY-MM-DD HH:MM:SS: {e}"))
}

// ── Actions ─────────────────────────────────────────────────────────

/// Spawns an external program; a non-zero exit is a failed firing.
struct CommandAction {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandAction {
    fn new(mut command: Vec<String>) -> Option<Self> {
        if command.is_empty() {
            return None;
        }
        let program = command.remove(0);
        Some(Self {
            name: program.clone(),
            program,
            args: command,
        })
    }
}

#[async_trait]
impl ServiceAction for CommandAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> anyhow::Result<()> {
        let status = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .status()
            .await?;
        if !status.success() {
            anyhow::bail!("{} exited with {status}", self.program);
        }
        Ok(())
    }
}

/// Placeholder action when no command is given.
struct Heartbeat {
    profile: String,
}

#[async_trait]
impl ServiceAction for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn run(&self) -> anyhow::Result<()> {
        info!(profile = %self.profile, "heartbeat");
        Ok(())
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    svctimer_core::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let timers = match &cli.config {
        Some(path) => {
            let timers = ServiceTimerConfig::from_file(path)?;
            info!(path = %path, entries = timers.configs.len(), "timer config loaded");
            timers
        }
        None => ServiceTimerConfig::from_env()?,
    };
    let config = timers.select(cli.name.as_deref())?.clone();

    let profile = config.ref_name.clone();
    let action: Arc<dyn ServiceAction> = match CommandAction::new(cli.command) {
        Some(command) => Arc::new(command),
        None => Arc::new(Heartbeat { profile }),
    };
    let logger: Arc<dyn ServiceLogger> = match &cli.log_dir {
        Some(dir) => Arc::new(FileLogger::new(dir)),
        None => Arc::new(TracingLogger),
    };

    let mut builder = ServiceTimer::builder(config, action).logger(logger);
    if let Some(origin) = cli.start_at {
        warn!(start_at = %origin, "dry run: wall clock shifted");
        builder = builder.clock(Arc::new(ShiftedClock::starting_at(origin)));
    }
    let timer = builder.build();
    info!(
        profile = %timer.config().ref_name,
        mode = %timer.config().mode,
        "timer-worker configured"
    );

    if cli.once {
        timer.process_checked().await?;
        info!("timer-worker ran once, exiting");
        return Ok(());
    }

    timer.start()?;
    if let Some(next) = timer.next_deadline() {
        info!(next = %next, "timer-worker waiting for first deadline");
    }

    tokio::signal::ctrl_c().await?;
    info!("ctrl-c received, stopping timer");
    timer.shutdown().await;
    info!("timer-worker exited cleanly");
    Ok(())
}
