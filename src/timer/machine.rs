//! The pure transition core.
//!
//! `handle` mutates a [`SessionState`] and returns the side-effect
//! intents the caller must execute, in order. It performs no I/O itself,
//! which keeps every transition testable against a fixed clock.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::dispatch::{AttentionAlert, Cue, TimerEvent};
use crate::models::{LogEntry, LogEvent};

use super::state::{Phase, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartFocus { focus_minutes: u32, break_minutes: u32 },
    StartBreak,
    Reset,
    Acknowledge,
    /// Tick-source re-entry. No-op unless a phase is running.
    Tick,
    /// Startup re-entry after the process was torn down. Rearms silently
    /// or synthesizes the phase end that was missed while unloaded.
    Recover,
}

/// Side-effect intents, executed by the controller against its injected
/// collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Persist the current `SessionState` snapshot whole.
    Persist,
    /// Append to the session trail (broadcasts `StatsChanged` once stored).
    Append(LogEntry),
    Broadcast(TimerEvent),
    ArmTick,
    DisarmTick,
    /// Emit a sound cue, subject to the user's sound settings.
    Cue(Cue),
    RaiseAlert(AttentionAlert),
    ClearAlert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("focus and break durations must be positive")]
    InvalidDuration,
    #[error("{operation} is not valid in the {phase:?} phase")]
    WrongPhase {
        operation: &'static str,
        phase: Phase,
    },
}

pub fn handle(
    state: &mut SessionState,
    command: Command,
    now: DateTime<Utc>,
) -> Result<Vec<Effect>, TransitionError> {
    match command {
        Command::StartFocus {
            focus_minutes,
            break_minutes,
        } => {
            if focus_minutes == 0 || break_minutes == 0 {
                return Err(TransitionError::InvalidDuration);
            }
            if state.is_running {
                return Err(TransitionError::AlreadyRunning);
            }

            let session_id = Uuid::new_v4().to_string();
            state.begin_focus(now, focus_minutes, break_minutes, session_id.clone());

            Ok(vec![
                Effect::Append(LogEntry::phase_started(
                    LogEvent::FocusStart,
                    now,
                    Some(session_id),
                    focus_minutes,
                )),
                Effect::Persist,
                Effect::ArmTick,
                Effect::Cue(Cue::FocusStart),
                Effect::Broadcast(update(state)),
            ])
        }

        Command::StartBreak => {
            if state.phase != Phase::FocusEnded {
                return Err(TransitionError::WrongPhase {
                    operation: "startBreak",
                    phase: state.phase,
                });
            }

            state.begin_break(now);

            Ok(vec![
                Effect::ClearAlert,
                Effect::Append(LogEntry::phase_started(
                    LogEvent::BreakStart,
                    now,
                    state.session_id.clone(),
                    state.break_minutes,
                )),
                Effect::Persist,
                Effect::ArmTick,
                Effect::Cue(Cue::BreakStart),
                Effect::Broadcast(update(state)),
            ])
        }

        Command::Reset => {
            let mut effects = Vec::new();
            if state.is_running && state.session_id.is_some() {
                effects.push(Effect::Append(LogEntry::session_reset(
                    now,
                    state.session_id.clone(),
                    state.remaining_at(now),
                    state.phase,
                )));
            }

            state.reset_to_ready();

            effects.extend([
                Effect::DisarmTick,
                Effect::ClearAlert,
                Effect::Persist,
                Effect::Broadcast(TimerEvent::TimerReset),
                Effect::Broadcast(update(state)),
            ]);
            Ok(effects)
        }

        Command::Acknowledge => {
            if state.phase != Phase::BreakEnded {
                return Err(TransitionError::WrongPhase {
                    operation: "acknowledge",
                    phase: state.phase,
                });
            }

            state.phase = Phase::Ready;
            state.time_left_secs = 0;

            Ok(vec![
                Effect::ClearAlert,
                Effect::Persist,
                Effect::Broadcast(update(state)),
            ])
        }

        Command::Tick => {
            if !state.is_running {
                return Ok(Vec::new());
            }

            let remaining = state.remaining_at(now);
            state.time_left_secs = remaining;

            if remaining > 0 {
                Ok(vec![Effect::Persist, Effect::Broadcast(update(state))])
            } else {
                Ok(expire(state, now))
            }
        }

        Command::Recover => {
            if !state.is_running || state.started_at.is_none() {
                return Ok(Vec::new());
            }

            let remaining = state.remaining_at(now);
            state.time_left_secs = remaining;

            if remaining > 0 {
                // resume silently: no re-logging, no cue
                Ok(vec![Effect::ArmTick])
            } else {
                Ok(expire(state, now))
            }
        }
    }
}

/// Phase-end transition shared by a live tick and recovery synthesis.
fn expire(state: &mut SessionState, now: DateTime<Utc>) -> Vec<Effect> {
    let actual_minutes = state.elapsed_whole_minutes(now);
    let session_id = state.session_id.clone();

    let (event, cue, alert, planned_minutes) = match state.phase {
        Phase::Focus => (
            LogEvent::FocusEnd,
            Cue::FocusEnd,
            AttentionAlert::focus_ended(),
            state.focus_minutes,
        ),
        Phase::Break => (
            LogEvent::BreakEnd,
            Cue::BreakEnd,
            AttentionAlert::break_ended(),
            state.break_minutes,
        ),
        // is_running holds only in Focus/Break; nothing to expire otherwise
        _ => return Vec::new(),
    };

    state.finish_phase();

    vec![
        Effect::DisarmTick,
        Effect::Append(LogEntry::phase_ended(
            event,
            now,
            session_id,
            actual_minutes,
            planned_minutes,
        )),
        Effect::Cue(cue),
        Effect::RaiseAlert(alert),
        Effect::Persist,
        Effect::Broadcast(update(state)),
    ]
}

fn update(state: &SessionState) -> TimerEvent {
    TimerEvent::TimerUpdate {
        time_left: state.time_left_secs,
        phase: state.phase,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn ready() -> SessionState {
        SessionState::with_defaults(25, 5)
    }

    fn start_focus(state: &mut SessionState, secs: i64) -> Vec<Effect> {
        handle(
            state,
            Command::StartFocus {
                focus_minutes: 25,
                break_minutes: 5,
            },
            at(secs),
        )
        .unwrap()
    }

    #[test]
    fn start_focus_enters_a_running_focus_phase() {
        let mut state = ready();
        let effects = start_focus(&mut state, 0);

        assert!(state.is_running);
        assert_eq!(state.phase, Phase::Focus);
        assert_eq!(state.time_left_secs, 1500);
        assert_eq!(state.started_at, Some(at(0)));
        assert!(state.session_id.is_some());

        // log first, then persist/arm/cue, closing with the update
        assert!(matches!(
            effects.first(),
            Some(Effect::Append(LogEntry {
                event: LogEvent::FocusStart,
                planned_minutes: Some(25),
                ..
            }))
        ));
        assert!(effects.contains(&Effect::ArmTick));
        assert!(effects.contains(&Effect::Cue(Cue::FocusStart)));
        assert_eq!(
            effects.last(),
            Some(&Effect::Broadcast(TimerEvent::TimerUpdate {
                time_left: 1500,
                phase: Phase::Focus,
            }))
        );
    }

    #[test]
    fn start_focus_rejects_zero_durations() {
        let mut state = ready();
        let err = handle(
            &mut state,
            Command::StartFocus {
                focus_minutes: 0,
                break_minutes: 5,
            },
            at(0),
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::InvalidDuration);
        assert_eq!(state.phase, Phase::Ready);
    }

    #[test]
    fn start_focus_rejects_an_in_progress_session() {
        let mut state = ready();
        start_focus(&mut state, 0);
        let before = state.clone();

        let err = start_focus_err(&mut state);
        assert_eq!(err, TransitionError::AlreadyRunning);
        assert_eq!(state, before);
    }

    fn start_focus_err(state: &mut SessionState) -> TransitionError {
        handle(
            state,
            Command::StartFocus {
                focus_minutes: 10,
                break_minutes: 2,
            },
            at(1),
        )
        .unwrap_err()
    }

    #[test]
    fn start_break_requires_an_ended_focus() {
        let mut state = ready();
        let err = handle(&mut state, Command::StartBreak, at(0)).unwrap_err();
        assert_eq!(
            err,
            TransitionError::WrongPhase {
                operation: "startBreak",
                phase: Phase::Ready,
            }
        );
    }

    #[test]
    fn tick_is_a_no_op_when_idle() {
        let mut state = ready();
        let effects = handle(&mut state, Command::Tick, at(0)).unwrap();
        assert!(effects.is_empty());
        assert_eq!(state, ready());
    }

    #[test]
    fn tick_recomputes_remaining_from_the_clock() {
        let mut state = ready();
        start_focus(&mut state, 0);

        let effects = handle(&mut state, Command::Tick, at(615)).unwrap();
        assert_eq!(state.time_left_secs, 885);
        assert_eq!(
            effects,
            vec![
                Effect::Persist,
                Effect::Broadcast(TimerEvent::TimerUpdate {
                    time_left: 885,
                    phase: Phase::Focus,
                }),
            ]
        );
    }

    #[test]
    fn exhausted_tick_expires_the_focus_phase() {
        let mut state = ready();
        start_focus(&mut state, 0);
        let session_id = state.session_id.clone();

        let effects = handle(&mut state, Command::Tick, at(1500)).unwrap();

        assert_eq!(state.phase, Phase::FocusEnded);
        assert!(!state.is_running);
        assert_eq!(state.started_at, None);
        assert_eq!(state.session_id, session_id);

        assert_eq!(effects.first(), Some(&Effect::DisarmTick));
        assert!(effects.contains(&Effect::Append(LogEntry::phase_ended(
            LogEvent::FocusEnd,
            at(1500),
            session_id,
            25,
            25,
        ))));
        assert!(effects.contains(&Effect::RaiseAlert(AttentionAlert::focus_ended())));
        assert!(effects.contains(&Effect::Cue(Cue::FocusEnd)));
    }

    #[test]
    fn full_session_walkthrough() {
        let mut state = ready();
        start_focus(&mut state, 0);
        handle(&mut state, Command::Tick, at(1500)).unwrap();
        assert_eq!(state.phase, Phase::FocusEnded);

        handle(&mut state, Command::StartBreak, at(1510)).unwrap();
        assert_eq!(state.phase, Phase::Break);
        assert_eq!(state.time_left_secs, 300);

        let effects = handle(&mut state, Command::Tick, at(1810)).unwrap();
        assert_eq!(state.phase, Phase::BreakEnded);
        assert!(effects.contains(&Effect::RaiseAlert(AttentionAlert::break_ended())));

        let effects = handle(&mut state, Command::Acknowledge, at(1820)).unwrap();
        assert_eq!(state.phase, Phase::Ready);
        assert_eq!(state.time_left_secs, 0);
        assert!(effects.contains(&Effect::ClearAlert));
    }

    #[test]
    fn acknowledge_outside_break_ended_is_rejected() {
        let mut state = ready();
        let err = handle(&mut state, Command::Acknowledge, at(0)).unwrap_err();
        assert_eq!(
            err,
            TransitionError::WrongPhase {
                operation: "acknowledge",
                phase: Phase::Ready,
            }
        );
    }

    #[test]
    fn reset_mid_focus_logs_remaining_time_and_phase() {
        let mut state = ready();
        start_focus(&mut state, 0);
        let session_id = state.session_id.clone();

        let effects = handle(&mut state, Command::Reset, at(100)).unwrap();

        assert_eq!(state.phase, Phase::Ready);
        assert!(!state.is_running);
        assert_eq!(state.started_at, None);
        assert_eq!(state.session_id, None);

        assert_eq!(
            effects.first(),
            Some(&Effect::Append(LogEntry::session_reset(
                at(100),
                session_id,
                1400,
                Phase::Focus,
            )))
        );
        assert!(effects.contains(&Effect::DisarmTick));
        assert!(effects.contains(&Effect::ClearAlert));

        // distinct reset event precedes the follow-up update
        let broadcasts: Vec<_> = effects
            .iter()
            .filter(|e| matches!(e, Effect::Broadcast(_)))
            .collect();
        assert_eq!(
            broadcasts,
            vec![
                &Effect::Broadcast(TimerEvent::TimerReset),
                &Effect::Broadcast(TimerEvent::TimerUpdate {
                    time_left: 0,
                    phase: Phase::Ready,
                }),
            ]
        );
    }

    #[test]
    fn reset_when_idle_appends_nothing() {
        let mut state = ready();
        let effects = handle(&mut state, Command::Reset, at(0)).unwrap();
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::Append(_))));
    }

    #[test]
    fn recover_rearms_silently_with_time_remaining() {
        let mut state = ready();
        start_focus(&mut state, 0);

        // pretend the process died and came back 10 minutes in
        let effects = handle(&mut state, Command::Recover, at(600)).unwrap();

        assert_eq!(state.time_left_secs, 900);
        assert_eq!(effects, vec![Effect::ArmTick]);
    }

    #[test]
    fn recover_synthesizes_a_missed_phase_end() {
        let mut state = ready();
        start_focus(&mut state, 0);

        let effects = handle(&mut state, Command::Recover, at(4000)).unwrap();

        assert_eq!(state.phase, Phase::FocusEnded);
        let end_entries: Vec<_> = effects
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Effect::Append(LogEntry {
                        event: LogEvent::FocusEnd,
                        ..
                    })
                )
            })
            .collect();
        assert_eq!(end_entries.len(), 1);
        assert!(effects.contains(&Effect::RaiseAlert(AttentionAlert::focus_ended())));
    }

    #[test]
    fn recover_does_nothing_for_idle_state() {
        let mut state = ready();
        let effects = handle(&mut state, Command::Recover, at(0)).unwrap();
        assert!(effects.is_empty());
    }
}
