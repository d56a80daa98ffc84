//! Capture implementations
//!
//! This module provides the screen and input capture channels a recording
//! session runs. Screen frames go straight into an ffmpeg child process;
//! input events go through a global OS hook into the CSV logs the export
//! pipeline reads back.

pub mod input;
pub mod screen;

pub use input::InputTrackingChannel;
pub use screen::ScreenCaptureChannel;
