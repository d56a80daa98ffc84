//! Debug-video export.
//!
//! Streams the recorded screen video frame by frame, reconstructs the input
//! state at each frame's timestamp, renders the overlay and appends the
//! annotated frame to the output encoder. Decode and encode go through
//! ffmpeg child processes speaking raw RGB24 over pipes; the streaming loop
//! itself only sees the [`FrameSource`] / [`FrameSink`] seams.

pub mod assembler;
pub mod decoder;
pub mod encoder;

use std::collections::VecDeque;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ChildStderr;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::events::LogError;
use crate::processing::FrameBuffer;

pub use assembler::{generate_debug_video, ExportSummary, RenderOptions};
pub use decoder::{FfmpegDecoder, VideoMetadata};
pub use encoder::FfmpegEncoder;

/// Errors surfaced by `generate_debug_video`.
///
/// There are no internal retries: this is an offline, deterministic
/// conversion, so every failure aborts and propagates to the caller.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Invalid setup (frame rate, font, paths); raised before any
    /// processing begins.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An event log could not be loaded; aborts before any output exists.
    #[error(transparent)]
    Log(#[from] LogError),

    #[error("failed to open input video {path}: {reason}")]
    VideoOpen { path: PathBuf, reason: String },

    /// The source became unreadable mid-stream.
    #[error("failed to decode input video: {0}")]
    VideoDecode(String),

    /// The destination could not be created or the encoder failed; any
    /// partial output is removed before this surfaces.
    #[error("failed to write output video: {0}")]
    OutputWrite(String),
}

/// A streaming source of decoded RGB frames, in presentation order.
pub trait FrameSource {
    fn metadata(&self) -> &VideoMetadata;

    /// Next frame, or `None` once the stream ends cleanly.
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, ExportError>;
}

/// A streaming sink of rendered RGB frames, written in presentation order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<(), ExportError>;

    /// Flush and close the output container.
    fn finish(&mut self) -> Result<(), ExportError>;
}

/// Collect the tail of a child's stderr on a helper thread.
///
/// ffmpeg blocks once its stderr pipe fills, so stderr has to be drained
/// while frames stream; the last lines are kept for error reporting.
pub(crate) fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let reader = std::io::BufReader::new(stderr);
        let mut tail: VecDeque<String> = VecDeque::new();
        for line in reader.lines().map_while(Result::ok) {
            tail.push_back(line);
            if tail.len() > 20 {
                tail.pop_front();
            }
        }
        tail.into_iter().collect::<Vec<_>>().join("\n")
    })
}
