#![allow(dead_code)]

use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tomoro::{
    AttentionAlert, AttentionSink, Broadcast, Clock, Database, SettingsStore, TimerController,
    TimerEvent,
};

/// Scripted wall clock; tests advance it instead of sleeping.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn start() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )))
    }

    pub fn advance_secs(&self, secs: i64) {
        *self.0.lock().unwrap() += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct CollectingBus(Mutex<Vec<TimerEvent>>);

impl CollectingBus {
    pub fn events(&self) -> Vec<TimerEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl Broadcast for CollectingBus {
    fn publish(&self, event: TimerEvent) {
        self.0.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct RecordingAttention {
    pub visible: AtomicBool,
    raised: Mutex<Vec<AttentionAlert>>,
    cleared: AtomicUsize,
}

impl RecordingAttention {
    pub fn raised(&self) -> Vec<AttentionAlert> {
        self.raised.lock().unwrap().clone()
    }

    pub fn cleared(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }
}

impl AttentionSink for RecordingAttention {
    fn surface_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn raise(&self, alert: AttentionAlert) -> anyhow::Result<()> {
        self.raised.lock().unwrap().push(alert);
        Ok(())
    }

    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub controller: TimerController,
    pub db: Database,
    pub settings: Arc<SettingsStore>,
    pub bus: Arc<CollectingBus>,
    pub attention: Arc<RecordingAttention>,
    pub clock: Arc<ManualClock>,
}

/// Build a controller over `dir` and run startup recovery, the way an
/// embedding process would.
pub async fn harness(dir: &Path, clock: Arc<ManualClock>) -> Harness {
    let db = Database::new(dir.join("tomoro.sqlite3")).unwrap();
    let settings = Arc::new(SettingsStore::new(dir.join("settings.json")).unwrap());
    let bus = Arc::new(CollectingBus::default());
    let attention = Arc::new(RecordingAttention::default());

    let controller = TimerController::new(
        db.clone(),
        settings.clone(),
        bus.clone(),
        attention.clone(),
        clock.clone(),
    );
    controller.recover().await.unwrap();

    Harness {
        controller,
        db,
        settings,
        bus,
        attention,
        clock,
    }
}
