//! The studio session: state machine, presets and progress display.

mod controller;
pub mod presets;
pub mod progress;

pub use controller::{Session, SessionState, SkipReason, SubmitOutcome};
pub use progress::{ProgressIndicator, ProgressSnapshot, SimulatedProgress, StaticProgress};
