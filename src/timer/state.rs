use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Ready,
    Focus,
    Break,
    FocusEnded,
    BreakEnded,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Ready
    }
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Ready => "ready",
            Phase::Focus => "focus",
            Phase::Break => "break",
            Phase::FocusEnded => "focusEnded",
            Phase::BreakEnded => "breakEnded",
        }
    }
}

/// The one mutable record the controller owns. Persisted whole on every
/// mutation and restored on startup.
///
/// Invariants:
/// - `phase` is `Focus`/`Break` iff `is_running` iff `started_at` is set.
/// - While running, `time_left_secs` is derived from `started_at` against
///   the current wall clock, never decremented per tick.
/// - `session_id` is minted at focus start, carried through the break and
///   cleared on reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub is_running: bool,
    pub phase: Phase,
    pub time_left_secs: u32,
    pub focus_minutes: u32,
    pub break_minutes: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub session_id: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::with_defaults(25, 5)
    }
}

impl SessionState {
    pub fn with_defaults(focus_minutes: u32, break_minutes: u32) -> Self {
        Self {
            is_running: false,
            phase: Phase::Ready,
            time_left_secs: 0,
            focus_minutes,
            break_minutes,
            started_at: None,
            session_id: None,
        }
    }

    /// Planned length of the current phase in seconds. Zero outside a
    /// running phase.
    pub fn planned_secs(&self) -> u32 {
        match self.phase {
            Phase::Focus => self.focus_minutes.saturating_mul(60),
            Phase::Break => self.break_minutes.saturating_mul(60),
            _ => 0,
        }
    }

    /// Seconds elapsed since the phase began, clamped to zero so a
    /// backwards wall-clock step never inflates the remaining time.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        match self.started_at {
            Some(started_at) => (now - started_at).num_seconds().max(0),
            None => 0,
        }
    }

    /// Remaining seconds computed from absolute timestamps. While not
    /// running this is the frozen `time_left_secs`.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u32 {
        if !self.is_running || self.started_at.is_none() {
            return self.time_left_secs;
        }
        (i64::from(self.planned_secs()) - self.elapsed_secs(now)).max(0) as u32
    }

    /// Elapsed time rounded to whole minutes, the unit end-of-phase log
    /// entries record.
    pub fn elapsed_whole_minutes(&self, now: DateTime<Utc>) -> u32 {
        ((self.elapsed_secs(now) + 30) / 60) as u32
    }

    /// Re-derive `time_left_secs` for a running phase; no-op otherwise.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        if self.is_running {
            self.time_left_secs = self.remaining_at(now);
        }
    }

    pub(crate) fn begin_focus(
        &mut self,
        now: DateTime<Utc>,
        focus_minutes: u32,
        break_minutes: u32,
        session_id: String,
    ) {
        self.is_running = true;
        self.phase = Phase::Focus;
        self.focus_minutes = focus_minutes;
        self.break_minutes = break_minutes;
        self.time_left_secs = focus_minutes.saturating_mul(60);
        self.started_at = Some(now);
        self.session_id = Some(session_id);
    }

    pub(crate) fn begin_break(&mut self, now: DateTime<Utc>) {
        self.is_running = true;
        self.phase = Phase::Break;
        self.time_left_secs = self.break_minutes.saturating_mul(60);
        self.started_at = Some(now);
        // session_id is carried over from the focus phase
    }

    /// Close out a running phase in place. The remaining time freezes at
    /// zero and the session id survives into the ended phase.
    pub(crate) fn finish_phase(&mut self) {
        self.phase = match self.phase {
            Phase::Focus => Phase::FocusEnded,
            Phase::Break => Phase::BreakEnded,
            other => other,
        };
        self.is_running = false;
        self.time_left_secs = 0;
        self.started_at = None;
    }

    pub(crate) fn reset_to_ready(&mut self) {
        self.is_running = false;
        self.phase = Phase::Ready;
        self.time_left_secs = 0;
        self.started_at = None;
        self.session_id = None;
    }
}
