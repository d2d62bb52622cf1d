mod clock;
mod controller;
pub mod machine;
mod state;

pub use clock::{Clock, SystemClock};
pub use controller::TimerController;
pub use machine::{Command, Effect, TransitionError};
pub use state::{Phase, SessionState};
