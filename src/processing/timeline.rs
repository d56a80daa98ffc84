//! Frame index to timestamp mapping.

use thiserror::Error;

/// Rejected frame rate, caught at setup before any frame is processed.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("frame rate must be a positive number, got {0}")]
pub struct InvalidFrameRate(pub f64);

/// Maps output frame indices onto the recording's time base.
///
/// Frame 0 is the recording start (t = 0); both event logs share that
/// epoch, so a frame's timestamp can be used to query them directly.
#[derive(Debug, Clone, Copy)]
pub struct FrameTimeline {
    fps: f64,
}

impl FrameTimeline {
    pub fn new(fps: f64) -> Result<Self, InvalidFrameRate> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(InvalidFrameRate(fps));
        }
        Ok(Self { fps })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Timestamp of frame `index` in seconds since recording start.
    pub fn timestamp_for_frame(&self, index: u64) -> f64 {
        index as f64 / self.fps
    }
}
