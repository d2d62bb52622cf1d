//! Session-trail records.
//!
//! Every phase transition appends one `LogEntry` to an append-only,
//! capped trail. Consumers correlate `*Start`/`*End` pairs through the
//! shared session id to derive statistics; the controller itself never
//! reads the trail back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::Phase;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LogEvent {
    FocusStart,
    FocusEnd,
    BreakStart,
    BreakEnd,
    SessionReset,
}

impl LogEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEvent::FocusStart => "focusStart",
            LogEvent::FocusEnd => "focusEnd",
            LogEvent::BreakStart => "breakStart",
            LogEvent::BreakEnd => "breakEnd",
            LogEvent::SessionReset => "sessionReset",
        }
    }
}

/// One record in the session trail. Payload fields are event-specific:
/// start events carry the planned duration and actual start instant, end
/// events the planned and actual durations in whole minutes, and a reset
/// the remaining time and phase it interrupted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: LogEvent,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub planned_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub actual_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub actual_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remaining_secs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub phase: Option<Phase>,
}

impl LogEntry {
    fn bare(event: LogEvent, timestamp: DateTime<Utc>, session_id: Option<String>) -> Self {
        Self {
            timestamp,
            event,
            session_id,
            planned_minutes: None,
            actual_start: None,
            actual_minutes: None,
            remaining_secs: None,
            phase: None,
        }
    }

    pub fn phase_started(
        event: LogEvent,
        timestamp: DateTime<Utc>,
        session_id: Option<String>,
        planned_minutes: u32,
    ) -> Self {
        Self {
            planned_minutes: Some(planned_minutes),
            actual_start: Some(timestamp),
            ..Self::bare(event, timestamp, session_id)
        }
    }

    pub fn phase_ended(
        event: LogEvent,
        timestamp: DateTime<Utc>,
        session_id: Option<String>,
        actual_minutes: u32,
        planned_minutes: u32,
    ) -> Self {
        Self {
            actual_minutes: Some(actual_minutes),
            planned_minutes: Some(planned_minutes),
            ..Self::bare(event, timestamp, session_id)
        }
    }

    pub fn session_reset(
        timestamp: DateTime<Utc>,
        session_id: Option<String>,
        remaining_secs: u32,
        phase: Phase,
    ) -> Self {
        Self {
            remaining_secs: Some(remaining_secs),
            phase: Some(phase),
            ..Self::bare(LogEvent::SessionReset, timestamp, session_id)
        }
    }
}
