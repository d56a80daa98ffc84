//! iolens - record screen and input together, play them back as one.
//!
//! This is the main library crate for iolens. It records a desktop session
//! as a screen video plus mouse/keyboard event logs sharing a single epoch,
//! and reconstructs a frame-accurate "debug" video with the live input
//! state (cursor position, pressed keys and buttons, elapsed time) burned
//! into every frame.

pub mod capture;
pub mod events;
pub mod export;
pub mod processing;
pub mod recorder;
pub mod replay;

pub use export::{generate_debug_video, ExportError, ExportSummary, RenderOptions};
