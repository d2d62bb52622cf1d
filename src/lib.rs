//! Background timer controller for focus/break interval sessions.
//!
//! The crate owns one [`SessionState`] and advances it from commands and
//! a coarse 1-second tick. Remaining time is always re-derived from the
//! phase's absolute start timestamp, so the timer stays correct across
//! clock drift, process restarts and arbitrarily long suspensions. State
//! is persisted whole on every mutation and broadcast to any listening
//! front-ends; front-ends themselves (rendering, playback, charts) live
//! outside this crate.
//!
//! [`TimerController`] wires the pure transition core ([`machine`]) to
//! its injected collaborators: a [`Database`], a [`Broadcast`]
//! dispatcher, an [`AttentionSink`] and a [`Clock`].

mod db;
mod dispatch;
mod models;
mod settings;
mod stats;
mod timer;

pub use db::Database;
pub use dispatch::{
    AlertAction, AttentionAlert, AttentionSink, Broadcast, Cue, EventBus, NullAttention,
    TimerEvent,
};
pub use models::{LogEntry, LogEvent};
pub use settings::{CueSetting, SettingsStore, UserSettings};
pub use stats::{daily_summary, week_summary, DailySummary, WeekSummary};
pub use timer::{
    machine, Clock, Command, Effect, Phase, SessionState, SystemClock, TimerController,
    TransitionError,
};

/// Initialize env-filtered logging for embedding binaries. Safe to call
/// more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
