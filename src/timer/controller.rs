use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use anyhow::Result;
use log::{error, info, warn};
use tokio::{
    sync::Mutex,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::Database,
    dispatch::{AttentionAlert, AttentionSink, Broadcast, Cue, TimerEvent},
    settings::SettingsStore,
};

use super::{
    clock::Clock,
    machine::{self, Command, Effect, TransitionError},
    state::SessionState,
};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Stable identity of the recurring tick trigger. Only one ticker may
/// exist per controller; arming always clears the previous one first.
const TICKER_NAME: &str = "session-tick";

/// Owns the session state and drives it from commands and ticks.
///
/// All mutation goes through the pure transition core; this type only
/// executes the returned effects against its injected collaborators.
/// Persistence and broadcast failures are logged and swallowed: state is
/// recomputed from absolute timestamps, so the next tick repairs anything
/// a lost write missed.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<SessionState>>,
    db: Database,
    settings: Arc<SettingsStore>,
    broadcast: Arc<dyn Broadcast>,
    attention: Arc<dyn AttentionSink>,
    clock: Arc<dyn Clock>,
    ticker: Arc<Mutex<Option<CancellationToken>>>,
}

impl TimerController {
    pub fn new(
        db: Database,
        settings: Arc<SettingsStore>,
        broadcast: Arc<dyn Broadcast>,
        attention: Arc<dyn AttentionSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let defaults = settings.snapshot();
        let state = SessionState::with_defaults(
            defaults.default_focus_minutes,
            defaults.default_break_minutes,
        );

        Self {
            state: Arc::new(Mutex::new(state)),
            db,
            settings,
            broadcast,
            attention,
            clock,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    /// Restore persisted state and resume where the previous process left
    /// off. A phase still in flight is rearmed silently; a phase whose
    /// time ran out while the process was unloaded gets its end
    /// transition synthesized here, log entry and alert included.
    pub async fn recover(&self) -> Result<()> {
        let Some(persisted) = self.db.load_state().await? else {
            return Ok(());
        };

        let (snapshot, effects) = {
            let mut state = self.state.lock().await;
            *state = persisted;
            let effects = machine::handle(&mut state, Command::Recover, self.clock.now())
                .unwrap_or_default();
            (state.clone(), effects)
        };

        if snapshot.is_running {
            info!(
                "recovered a running {} phase with {}s remaining",
                snapshot.phase.as_str(),
                snapshot.time_left_secs
            );
        }

        self.run_effects(&snapshot, effects).await;
        Ok(())
    }

    pub async fn start_focus(
        &self,
        focus_minutes: u32,
        break_minutes: u32,
    ) -> Result<SessionState, TransitionError> {
        self.apply(Command::StartFocus {
            focus_minutes,
            break_minutes,
        })
        .await
    }

    pub async fn start_break(&self) -> Result<SessionState, TransitionError> {
        self.apply(Command::StartBreak).await
    }

    pub async fn reset(&self) -> Result<SessionState, TransitionError> {
        self.apply(Command::Reset).await
    }

    /// Dismiss an ended break and return to `Ready`. Appends no log entry.
    pub async fn acknowledge(&self) -> Result<SessionState, TransitionError> {
        self.apply(Command::Acknowledge).await
    }

    /// Current state with `time_left_secs` re-derived from the clock.
    pub async fn state(&self) -> SessionState {
        let mut state = self.state.lock().await;
        state.refresh(self.clock.now());
        state.clone()
    }

    /// Tick-source entry point: advance or expire the running phase.
    /// Returns whether a phase is still running afterwards.
    pub async fn tick(&self) -> bool {
        match self.apply(Command::Tick).await {
            Ok(state) => state.is_running,
            // Tick has no preconditions; kept for signature uniformity
            Err(_) => false,
        }
    }

    async fn apply(&self, command: Command) -> Result<SessionState, TransitionError> {
        let (snapshot, effects) = {
            let mut state = self.state.lock().await;
            let effects = machine::handle(&mut state, command, self.clock.now())?;
            (state.clone(), effects)
        };

        self.run_effects(&snapshot, effects).await;
        Ok(snapshot)
    }

    async fn run_effects(&self, snapshot: &SessionState, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Persist => {
                    if let Err(err) = self.db.save_state(snapshot).await {
                        error!("failed to persist session state: {err:#}");
                    }
                }
                Effect::Append(entry) => match self.db.append_log(&entry).await {
                    Ok(()) => self.broadcast.publish(TimerEvent::StatsChanged),
                    Err(err) => error!("failed to append {} log entry: {err:#}", entry.event.as_str()),
                },
                Effect::Broadcast(event) => self.broadcast.publish(event),
                Effect::ArmTick => self.arm_ticker().await,
                Effect::DisarmTick => self.disarm_ticker().await,
                Effect::Cue(cue) => self.emit_cue(cue),
                Effect::RaiseAlert(alert) => self.raise_alert(alert),
                Effect::ClearAlert => self.attention.clear(),
            }
        }
    }

    /// Clear-then-create: any previous ticker is cancelled before the new
    /// one starts, so overlapping ticks cannot occur.
    // Returns a boxed future with an explicit `Send` bound to break the
    // compile-time auto-trait cycle through the spawned ticker task
    // (run_effects -> arm_ticker -> spawn(tick) -> run_effects); the
    // opaque future of an `async fn` cannot be resolved coinductively.
    fn arm_ticker(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let token = {
                let mut slot = self.ticker.lock().await;
                if let Some(existing) = slot.take() {
                    existing.cancel();
                }
                let token = CancellationToken::new();
                *slot = Some(token.clone());
                token
            };

            let controller = self.clone();
            tokio::spawn(async move {
                let mut interval = time::interval(TICK_INTERVAL);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // the first interval tick completes immediately; the armed
                // cadence starts one period out
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            info!("{TICKER_NAME} disarmed");
                            break;
                        }
                        _ = interval.tick() => {
                            if !controller.tick().await {
                                break;
                            }
                        }
                    }
                }
            });
        })
    }

    /// Idempotent: disarming with no ticker armed is a no-op.
    async fn disarm_ticker(&self) {
        if let Some(token) = self.ticker.lock().await.take() {
            token.cancel();
        }
    }

    /// Gate a cue on the user's sound settings, then hand it to the
    /// front-end that owns playback. No payload configured means no cue.
    fn emit_cue(&self, cue: Cue) {
        let settings = self.settings.snapshot();
        if !settings.master_sound_enabled {
            return;
        }
        let cue_setting = settings.cue(cue);
        if !cue_setting.enabled {
            return;
        }
        let Some(sound) = cue_setting.sound.clone() else {
            return;
        };
        self.broadcast.publish(TimerEvent::PlayCue { cue, sound });
    }

    fn raise_alert(&self, alert: AttentionAlert) {
        if self.attention.surface_visible() {
            // a visible surface renders the broadcast inline instead
            return;
        }
        if let Err(err) = self.attention.raise(alert) {
            warn!("attention alert unavailable: {err:#}");
        }
    }
}
