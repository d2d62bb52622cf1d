use chrono::{DateTime, Utc};

/// Wall-clock source. Injected so elapsed-time logic can be exercised
/// against a scripted clock instead of real sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
