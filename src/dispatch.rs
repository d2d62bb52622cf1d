//! Outbound surfaces: fire-and-forget broadcasts and the user-attention
//! path.
//!
//! Delivery is at-most-once with no retry and no queueing. A broadcast
//! with nobody listening is not an error; the next state change carries a
//! fresh snapshot anyway. The attention path is different: a phase-end
//! alert is sticky and stays up until its primary action is activated or
//! the session is reset.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::timer::Phase;

/// Phase-transition sound cues, gated by user settings before dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Cue {
    FocusStart,
    FocusEnd,
    BreakStart,
    BreakEnd,
}

/// Events pushed to listening front-ends.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimerEvent {
    /// Sent on every state change and on every tick of a running phase.
    #[serde(rename_all = "camelCase")]
    TimerUpdate { time_left: u32, phase: Phase },
    /// Sent once after a reset, before the follow-up `TimerUpdate`.
    TimerReset,
    /// Sent after every session-trail append.
    StatsChanged,
    /// Cue intent for whichever front-end owns audio playback. Carries
    /// the user-configured sound payload verbatim.
    #[serde(rename_all = "camelCase")]
    PlayCue { cue: Cue, sound: String },
}

/// Best-effort event delivery. Implementations must not block, retry or
/// surface missing listeners as errors.
pub trait Broadcast: Send + Sync {
    fn publish(&self, event: TimerEvent);
}

/// In-process fan-out over a tokio broadcast channel. Front-end adapters
/// subscribe; lagging or absent receivers are silently dropped.
pub struct EventBus {
    tx: broadcast::Sender<TimerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Broadcast for EventBus {
    fn publish(&self, event: TimerEvent) {
        // send only fails when there are no subscribers
        let _ = self.tx.send(event);
    }
}

/// Primary action attached to a phase-end alert. The hosting adapter
/// routes activation back into `TimerController::start_break` or
/// `TimerController::acknowledge`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AlertAction {
    StartBreak,
    Acknowledge,
}

/// A sticky, user-dismissable phase-end alert with a single primary
/// action. Raised only when no front-end surface is visible.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttentionAlert {
    pub message: &'static str,
    pub button_label: &'static str,
    pub action: AlertAction,
}

impl AttentionAlert {
    pub fn focus_ended() -> Self {
        Self {
            message: "Focus time has ended. It's time to take a break.",
            button_label: "Start Break",
            action: AlertAction::StartBreak,
        }
    }

    pub fn break_ended() -> Self {
        Self {
            message: "Break is over. Ready for another focus session?",
            button_label: "Got it",
            action: AlertAction::Acknowledge,
        }
    }
}

/// Platform hook for the user-attention path.
///
/// `clear` must be idempotent; clearing when nothing is showing is a
/// no-op. A failing `raise` degrades the feature, never the timer.
pub trait AttentionSink: Send + Sync {
    /// Whether any front-end surface is currently visible/focused. When
    /// true, phase-end state is presented inline through the normal
    /// broadcast instead of an alert.
    fn surface_visible(&self) -> bool;

    fn raise(&self, alert: AttentionAlert) -> Result<()>;

    fn clear(&self);
}

/// Sink for embedders without an alert subsystem; every alert is skipped.
pub struct NullAttention;

impl AttentionSink for NullAttention {
    fn surface_visible(&self) -> bool {
        false
    }

    fn raise(&self, alert: AttentionAlert) -> Result<()> {
        log::debug!("no attention sink configured; dropping alert: {}", alert.message);
        Ok(())
    }

    fn clear(&self) {}
}
