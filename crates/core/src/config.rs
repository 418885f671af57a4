use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimerError};

/// Default location of the timer config file.
pub const DEFAULT_CONFIG_PATH: &str = "config/timers.toml";

/// `H[:M[:S]]`, one or two digits per field; ASCII or full-width colon.
static TIME_OF_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<h>[01]?\d|2[0-3])(?:[:：](?P<m>[0-5]\d?))?(?:[:：](?P<s>[0-5]\d?))?$")
        .expect("time-of-day pattern is valid")
});

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Timer mode ────────────────────────────────────────────────

/// How a timer decides when to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "ModeRepr")]
pub enum TimerMode {
    /// Fixed poll period after an initial delay.
    #[default]
    Interval,
    /// Every day at the configured times.
    Day,
    /// One weekday per week (0 = Sunday).
    Week,
    /// One day-of-month per month.
    Month,
    /// One day-of-year per year.
    Year,
    /// One month/day pair per year.
    Date,
    /// N days before the last day of every month.
    LastDayOfMonth,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Interval => "interval",
            TimerMode::Day => "day",
            TimerMode::Week => "week",
            TimerMode::Month => "month",
            TimerMode::Year => "year",
            TimerMode::Date => "date",
            TimerMode::LastDayOfMonth => "last_day_of_month",
        }
    }

    /// Legacy numeric codes: 0 interval, 1 month, 2 week, 3 day, 4 year,
    /// 5 date, 6 last day of month.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(TimerMode::Interval),
            1 => Ok(TimerMode::Month),
            2 => Ok(TimerMode::Week),
            3 => Ok(TimerMode::Day),
            4 => Ok(TimerMode::Year),
            5 => Ok(TimerMode::Date),
            6 => Ok(TimerMode::LastDayOfMonth),
            _ => Err(TimerError::config(
                "mode",
                format!("unknown timer mode code {code} (expected 0..=6)"),
            )),
        }
    }

    /// Every mode except `Interval` is anchored to the calendar.
    pub fn is_calendar(&self) -> bool {
        !matches!(self, TimerMode::Interval)
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = TimerError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        if let Ok(code) = key.parse::<i64>() {
            return Self::from_code(code);
        }
        match key.as_str() {
            "interval" => Ok(TimerMode::Interval),
            "day" => Ok(TimerMode::Day),
            "week" => Ok(TimerMode::Week),
            "month" => Ok(TimerMode::Month),
            "year" => Ok(TimerMode::Year),
            "date" => Ok(TimerMode::Date),
            "lastdayofmonth" => Ok(TimerMode::LastDayOfMonth),
            _ => Err(TimerError::config(
                "mode",
                format!(
                    "unknown timer mode '{s}' (expected interval, day, week, month, year, date or last_day_of_month)"
                ),
            )),
        }
    }
}

/// A mode as written in config: a name or a legacy numeric code.
#[derive(Deserialize)]
#[serde(untagged)]
enum ModeRepr {
    Code(i64),
    Name(String),
}

impl TryFrom<ModeRepr> for TimerMode {
    type Error = TimerError;

    fn try_from(value: ModeRepr) -> Result<Self> {
        match value {
            ModeRepr::Code(code) => Self::from_code(code),
            ModeRepr::Name(name) => name.parse(),
        }
    }
}

/// Parse a trigger time such as `9`, `09:30`, `23:59:59` or `8：15`.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    let trimmed = raw.trim();
    let caps = TIME_OF_DAY.captures(trimmed).ok_or_else(|| {
        TimerError::config(
            "times",
            format!("'{raw}' is not a valid time of day (expected H[:M[:S]] with H in 0..=23)"),
        )
    })?;

    let field = |name: &str| -> u32 {
        caps.name(name)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    NaiveTime::from_hms_opt(field("h"), field("m"), field("s"))
        .ok_or_else(|| TimerError::config("times", format!("'{raw}' is out of range")))
}

// ── Single timer config ───────────────────────────────────────

/// One named timer definition, typically a `[[config]]` table in `timers.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Name used to pick this entry out of a [`ServiceTimerConfig`].
    #[serde(default)]
    pub ref_name: String,
    #[serde(default)]
    pub mode: TimerMode,
    /// Meaning depends on `mode`: weekday, day-of-month, day-of-year, or
    /// days-before-last.
    #[serde(default)]
    pub day_seq: i32,
    /// Month (1-12), `Date` mode only.
    #[serde(default)]
    pub month_seq: i32,
    /// Trigger times of day; empty means midnight only.
    #[serde(default)]
    pub times: Vec<String>,
    /// Poll period in milliseconds, `Interval` mode only.
    #[serde(default)]
    pub interval_ms: u64,
    /// Initial delay in milliseconds, `Interval` mode only.
    #[serde(default)]
    pub delay_ms: u64,
}

impl TimerConfig {
    pub fn new(mode: TimerMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_day_seq(mut self, day_seq: i32) -> Self {
        self.day_seq = day_seq;
        self
    }

    pub fn with_month_seq(mut self, month_seq: i32) -> Self {
        self.month_seq = month_seq;
        self
    }

    pub fn with_times<I, S>(mut self, times: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.times = times.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Parse every configured time string.
    pub fn parsed_times(&self) -> Result<Vec<NaiveTime>> {
        self.times.iter().map(|t| parse_time_of_day(t)).collect()
    }
}

// ── Named config set ──────────────────────────────────────────

/// A set of named timer configs plus the name of the default one.
///
/// ```toml
/// default = "nightly"
///
/// [[config]]
/// ref_name = "nightly"
/// mode = "day"
/// times = ["02:00", "14:30:15"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceTimerConfig {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default, rename = "config")]
    pub configs: Vec<TimerConfig>,
}

impl ServiceTimerConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Load from the file named by `SVCTIMER_CONFIG` (call-site `.env` honored).
    /// `SVCTIMER_PROFILE`, when set, replaces the file's `default`.
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        let path = env_or("SVCTIMER_CONFIG", DEFAULT_CONFIG_PATH);
        let mut config = Self::from_file(&path)?;
        if let Some(profile) = env_opt("SVCTIMER_PROFILE") {
            config.default = Some(profile);
        }
        tracing::info!(
            path = %path,
            entries = config.configs.len(),
            default = config.default.as_deref().unwrap_or("(first)"),
            "timer config loaded"
        );
        Ok(config)
    }

    /// Pick a timer config by name (case-insensitive).
    ///
    /// An empty or missing `name` falls back to `default`, and an empty
    /// `default` falls back to the first entry.
    pub fn select(&self, name: Option<&str>) -> Result<&TimerConfig> {
        if self.configs.is_empty() {
            return Err(TimerError::config("config", "no timer configs defined"));
        }

        let wanted = name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.default.as_deref().filter(|n| !n.trim().is_empty()));

        match wanted {
            None => Ok(&self.configs[0]),
            Some(wanted) => self
                .configs
                .iter()
                .find(|c| c.ref_name.eq_ignore_ascii_case(wanted.trim()))
                .ok_or_else(|| {
                    TimerError::config("ref_name", format!("no timer config named '{wanted}'"))
                }),
        }
    }
}
