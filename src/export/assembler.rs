//! The export pipeline: decode, annotate, encode.
//!
//! Strictly sequential by design. Frames are consumed and emitted in index
//! order because state reconstruction is a monotonic fold and the output
//! container needs frames in presentation order; there is exactly one
//! writer and the event logs are immutable for the whole run, so nothing
//! here needs a lock.

use std::path::{Path, PathBuf};

use super::{ExportError, FrameSink, FrameSource};
use crate::events::EventLog;
use crate::export::decoder::FfmpegDecoder;
use crate::export::encoder::FfmpegEncoder;
use crate::processing::{
    FrameBuffer, FrameTimeline, InputStateTracker, OverlayOptions, OverlayRenderer, StateSnapshot,
};

/// Knobs for one export run.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub overlay: OverlayOptions,
}

/// What a successful export produced.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub output: PathBuf,
    pub frames: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration: f64,
}

/// Render the debug-overlay video for one recorded session.
///
/// Both logs and the video are assumed to share epoch 0 at recording
/// start; that guarantee comes from the capture side and is not
/// re-verified here - a violated epoch shows up as a uniformly offset
/// overlay, not an error.
///
/// Completes or fails; on failure no output file is left behind.
pub fn generate_debug_video(
    input: &Path,
    mouse_csv: &Path,
    keyboard_csv: &Path,
    output: &Path,
    options: &RenderOptions,
) -> Result<ExportSummary, ExportError> {
    // Logs are validated in full before any video work so a malformed row
    // can never leave a partially written output behind.
    let mouse_log = EventLog::load_mouse(mouse_csv)?;
    let keyboard_log = EventLog::load_keyboard(keyboard_csv)?;
    tracing::info!(
        mouse_events = mouse_log.len(),
        keyboard_events = keyboard_log.len(),
        "event logs loaded"
    );

    let mut renderer = OverlayRenderer::new(options.overlay.clone())
        .map_err(|err| ExportError::Configuration(err.to_string()))?;

    let mut decoder = FfmpegDecoder::open(input)?;
    let metadata = decoder.metadata().clone();
    let timeline = FrameTimeline::new(metadata.fps)
        .map_err(|err| ExportError::Configuration(err.to_string()))?;
    tracing::info!(
        input = %input.display(),
        width = metadata.width,
        height = metadata.height,
        fps = metadata.fps,
        "input video opened"
    );

    let mut encoder = FfmpegEncoder::create(output, &metadata)?;
    let mut tracker = InputStateTracker::new(&mouse_log, &keyboard_log);

    let streamed = stream_frames(
        &mut decoder,
        &mut encoder,
        &mut tracker,
        &timeline,
        |frame, snapshot, timestamp| renderer.render(frame, snapshot, timestamp),
    );
    let result = streamed.and_then(|frames| {
        encoder.finish()?;
        Ok(frames)
    });

    match result {
        Ok(frames) => {
            let summary = ExportSummary {
                output: output.to_path_buf(),
                frames,
                width: metadata.width,
                height: metadata.height,
                fps: metadata.fps,
                duration: frames as f64 / metadata.fps,
            };
            tracing::info!(
                frames,
                output = %output.display(),
                "debug video written"
            );
            Ok(summary)
        }
        Err(err) => {
            // The encoder child must die before the partial file goes away.
            drop(encoder);
            if output.exists() {
                if let Err(remove_err) = std::fs::remove_file(output) {
                    tracing::warn!(
                        output = %output.display(),
                        error = %remove_err,
                        "failed to remove partial output"
                    );
                }
            }
            Err(err)
        }
    }
}

/// Drive frames from `source` through annotation into `sink`.
///
/// Emits exactly one output frame per source frame. The annotate callback
/// receives the frame, the reconstructed snapshot and the frame timestamp.
fn stream_frames<F>(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    tracker: &mut InputStateTracker<'_>,
    timeline: &FrameTimeline,
    mut annotate: F,
) -> Result<u64, ExportError>
where
    F: FnMut(&mut FrameBuffer, &StateSnapshot, f64),
{
    let mut frames = 0u64;
    while let Some(mut frame) = source.next_frame()? {
        let timestamp = timeline.timestamp_for_frame(frames);
        let snapshot = tracker.snapshot_at(timestamp);
        annotate(&mut frame, &snapshot, timestamp);
        sink.write_frame(&frame)?;
        frames += 1;
        if frames % 300 == 0 {
            tracing::debug!(frames, timestamp, "annotating");
        }
    }
    Ok(frames)
}
