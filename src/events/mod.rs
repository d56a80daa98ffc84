//! Event log model
//!
//! Typed, time-ordered mouse and keyboard events, loaded from the CSV logs
//! a recording session persists next to its screen video.

pub mod log;
pub mod types;

pub use log::{EventLog, LogError};
pub use types::{EventKind, KeyboardRow, MouseRow, TimedEvent};
