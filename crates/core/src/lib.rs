pub mod config;
pub mod error;

pub use config::{load_dotenv, parse_time_of_day, ServiceTimerConfig, TimerConfig, TimerMode};
pub use error::*;
