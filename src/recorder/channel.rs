//! Recording channel trait
//!
//! Defines the interface for the capture sources a session runs together
//! (screen video, input tracking).

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during recording
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Result type for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;

/// Trait for recording channels
///
/// Each channel represents one capture source. Channels are owned and
/// driven by the `RecordingSession`; all channels of a session share the
/// same epoch (the session start), which is what lets their outputs be
/// merged frame-accurately later.
#[async_trait]
pub trait RecordingChannel: Send + Sync {
    /// Get the channel identifier (e.g., "display", "input")
    fn id(&self) -> &str;

    /// Get the channel type
    fn channel_type(&self) -> ChannelType;

    /// Initialize the channel with the session output directory
    async fn initialize(&mut self, output_dir: &Path) -> RecordingResult<()>;

    /// Start recording
    async fn start(&mut self) -> RecordingResult<()>;

    /// Stop recording and flush outputs
    async fn stop(&mut self) -> RecordingResult<()>;

    /// Check if the channel is currently recording
    fn is_recording(&self) -> bool;

    /// Get output files created by this channel
    fn output_files(&self) -> Vec<String>;
}

/// Types of recording channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    /// Screen/display capture
    Display,
    /// Input tracking (mouse, keyboard)
    Input,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Display => write!(f, "display"),
            ChannelType::Input => write!(f, "input"),
        }
    }
}
