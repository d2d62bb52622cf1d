//! Read-side aggregation over the session trail.
//!
//! These helpers pair `FocusEnd` entries with their `FocusStart` through
//! the shared session id and sum actual durations from the recorded
//! timestamps. All bucketing is by UTC calendar date; callers that want
//! local-time buckets convert before asking.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::{LogEntry, LogEvent};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub focus_minutes: u32,
    pub sessions: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummary {
    /// Focus minutes per day, index 0 = the week's first day.
    pub per_day: [u32; 7],
    pub focus_minutes: u32,
    pub sessions: u32,
    pub avg_session_minutes: u32,
}

fn paired_duration_minutes(entries: &[LogEntry], end: &LogEntry) -> Option<u32> {
    let session_id = end.session_id.as_deref()?;
    let start = entries.iter().find(|e| {
        e.event == LogEvent::FocusStart && e.session_id.as_deref() == Some(session_id)
    })?;
    let minutes = (end.timestamp - start.timestamp).num_seconds().max(0) as f64 / 60.0;
    Some(minutes.round() as u32)
}

/// Total focus minutes and completed-session count for one day. Only
/// sessions whose start and end both landed on that day count, matching
/// how the trail is read for the "today" tile.
pub fn daily_summary(entries: &[LogEntry], day: NaiveDate) -> DailySummary {
    let today: Vec<&LogEntry> = entries
        .iter()
        .filter(|e| e.timestamp.date_naive() == day)
        .collect();

    let mut summary = DailySummary::default();
    for end in today.iter().filter(|e| e.event == LogEvent::FocusEnd) {
        let Some(session_id) = end.session_id.as_deref() else {
            continue;
        };
        let start = today.iter().find(|e| {
            e.event == LogEvent::FocusStart && e.session_id.as_deref() == Some(session_id)
        });
        if let Some(start) = start {
            let minutes =
                (end.timestamp - start.timestamp).num_seconds().max(0) as f64 / 60.0;
            summary.focus_minutes += minutes.round() as u32;
            summary.sessions += 1;
        }
    }
    summary
}

/// Seven-day focus histogram starting at `week_start`, plus totals.
/// Sessions are binned by the day their focus phase ended.
pub fn week_summary(entries: &[LogEntry], week_start: NaiveDate) -> WeekSummary {
    let week_end = week_start + Duration::days(7);

    let mut per_day = [0u32; 7];
    let mut sessions = 0u32;

    for end in entries.iter().filter(|e| e.event == LogEvent::FocusEnd) {
        let day = end.timestamp.date_naive();
        if day < week_start || day >= week_end {
            continue;
        }
        sessions += 1;
        if let Some(minutes) = paired_duration_minutes(entries, end) {
            let index = (day - week_start).num_days() as usize;
            per_day[index] += minutes;
        }
    }

    let focus_minutes: u32 = per_day.iter().sum();
    let avg_session_minutes = if sessions > 0 {
        (f64::from(focus_minutes) / f64::from(sessions)).round() as u32
    } else {
        0
    };

    WeekSummary {
        per_day,
        focus_minutes,
        sessions,
        avg_session_minutes,
    }
}
