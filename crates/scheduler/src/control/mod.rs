//! Timer-driven service control.
//!
//! A [`ServiceTimer`] owns one recurrence rule and at most one armed deadline.
//! The run loop moves `Armed -> Firing -> Armed` until stopped, and only
//! re-arms after the action has returned, so a slow action delays the next
//! tick instead of overlapping it.
//!
//! Split into focused submodules:
//! - `core`: ServiceTimer struct, builder, start/stop and status queries
//! - `tick`: the armed/firing loop and deadline bookkeeping
//! - `fire`: one guarded invocation of the action with error containment

mod core;
mod fire;
mod tick;

pub use self::core::{ServiceStatus, ServiceTimer, ServiceTimerBuilder};
