//! Streaming video decode through an ffmpeg child process.
//!
//! The input container is first probed for its dimensions and nominal
//! frame rate by parsing the ffmpeg banner, then a second child streams
//! raw RGB24 frames over stdout, one `read` loop per frame. The whole
//! video is never held in memory.

use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use super::{drain_stderr, ExportError, FrameSource};
use crate::processing::FrameBuffer;

/// Probed properties of the input video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate as reported by the container.
    pub fps: f64,
}

/// Frame-at-a-time RGB24 decoder over an ffmpeg child process.
pub struct FfmpegDecoder {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    metadata: VideoMetadata,
    frame_len: usize,
    finished: bool,
}

impl FfmpegDecoder {
    /// Probe `path` and spawn the decode stream.
    pub fn open(path: &Path) -> Result<Self, ExportError> {
        let metadata = probe(path)?;

        let mut child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(path)
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| ExportError::VideoOpen {
                path: path.to_path_buf(),
                reason: spawn_failure_reason(&err),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| ExportError::VideoOpen {
            path: path.to_path_buf(),
            reason: "failed to capture ffmpeg stdout".to_string(),
        })?;
        let stderr = child.stderr.take().map(drain_stderr);

        let frame_len = metadata.width as usize * metadata.height as usize * 3;

        tracing::debug!(
            width = metadata.width,
            height = metadata.height,
            fps = metadata.fps,
            "decode stream opened"
        );

        Ok(Self {
            child,
            stdout,
            stderr,
            metadata,
            frame_len,
            finished: false,
        })
    }

    fn stderr_tail(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    /// Reap the child after a clean EOF; a non-zero exit means the stream
    /// was cut short by a decode error, not a normal end.
    fn check_exit(&mut self) -> Result<(), ExportError> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|err| ExportError::VideoDecode(format!("failed to wait for ffmpeg: {err}")))?;
        if !status.success() {
            let tail = self.stderr_tail();
            return Err(ExportError::VideoDecode(format!(
                "ffmpeg exited with {status}: {tail}"
            )));
        }
        Ok(())
    }
}

impl FrameSource for FfmpegDecoder {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, ExportError> {
        let mut buffer = vec![0u8; self.frame_len];
        let mut read = 0usize;
        while read < self.frame_len {
            match self.stdout.read(&mut buffer[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(ExportError::VideoDecode(format!(
                        "failed reading decoded frame: {err}"
                    )))
                }
            }
        }

        if read == 0 {
            self.check_exit()?;
            return Ok(None);
        }
        if read < self.frame_len {
            let tail = self.stderr_tail();
            return Err(ExportError::VideoDecode(format!(
                "truncated frame: got {read} of {} bytes; {tail}",
                self.frame_len
            )));
        }

        Ok(Some(FrameBuffer::from_raw(
            self.metadata.width,
            self.metadata.height,
            buffer,
        )))
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Parse the input's dimensions and frame rate from the ffmpeg banner.
fn probe(path: &Path) -> Result<VideoMetadata, ExportError> {
    let open_error = |reason: String| ExportError::VideoOpen {
        path: path.to_path_buf(),
        reason,
    };

    // `ffmpeg -i` with no output always exits non-zero but prints the
    // stream information we need on stderr.
    let output = Command::new("ffmpeg")
        .arg("-hide_banner")
        .arg("-i")
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|err| open_error(spawn_failure_reason(&err)))?;

    let banner = String::from_utf8_lossy(&output.stderr);
    let mut size = None;
    let mut fps = None;
    for line in banner.lines() {
        if size.is_none() {
            size = parse_video_size(line);
        }
        if fps.is_none() {
            fps = parse_fps(line);
        }
        if size.is_some() && fps.is_some() {
            break;
        }
    }

    match (size, fps) {
        (Some((width, height)), Some(fps)) => Ok(VideoMetadata { width, height, fps }),
        _ => {
            // The trailing "At least one output file must be specified" is
            // how every probe run ends; the line before it says what is
            // actually wrong with the input.
            let detail = banner
                .lines()
                .rev()
                .map(str::trim)
                .find(|line| {
                    !line.is_empty() && *line != "At least one output file must be specified"
                })
                .unwrap_or("no video stream information in ffmpeg output");
            Err(open_error(detail.to_string()))
        }
    }
}

fn spawn_failure_reason(err: &std::io::Error) -> String {
    if err.kind() == std::io::ErrorKind::NotFound {
        "ffmpeg was not found on PATH; install ffmpeg and verify `ffmpeg -version` works"
            .to_string()
    } else {
        format!("failed to start ffmpeg: {err}")
    }
}

/// Extract `WxH` from a `Stream ... Video:` banner line.
fn parse_video_size(line: &str) -> Option<(u32, u32)> {
    if !line.contains(" Video: ") {
        return None;
    }
    for token in line.split(|c: char| c.is_whitespace() || c == ',' || c == '[' || c == ']') {
        let Some((raw_width, raw_height)) = token.split_once('x') else {
            continue;
        };
        let width = raw_width
            .trim_matches(|c: char| !c.is_ascii_digit())
            .parse::<u32>()
            .ok();
        let height = raw_height
            .trim_matches(|c: char| !c.is_ascii_digit())
            .parse::<u32>()
            .ok();
        if let (Some(width), Some(height)) = (width, height) {
            if width >= 16 && height >= 16 {
                return Some((width, height));
            }
        }
    }
    None
}

/// Extract the nominal frame rate from a `Stream ... Video:` banner line.
fn parse_fps(line: &str) -> Option<f64> {
    if !line.contains(" Video: ") {
        return None;
    }
    for chunk in line.split(',') {
        if let Some(value) = chunk.trim().strip_suffix(" fps") {
            if let Ok(fps) = value.trim().parse::<f64>() {
                if (1.0..=240.0).contains(&fps) {
                    return Some(fps);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANNER_LINE: &str =
        "  Stream #0:0(und): Video: h264 (High), yuv420p(progressive), 1920x1080, 30 fps, 30 tbr";

    #[test]
    fn parses_size_from_banner_line() {
        assert_eq!(parse_video_size(BANNER_LINE), Some((1920, 1080)));
    }

    #[test]
    fn parses_fractional_fps() {
        let line = "  Stream #0:0: Video: h264, yuv420p, 1280x720 [SAR 1:1], 29.97 fps, 30 tbr";
        let fps = parse_fps(line).expect("fps");
        assert!((fps - 29.97).abs() < 1e-9);
    }

    #[test]
    fn ignores_non_video_lines() {
        let line = "  Stream #0:1(und): Audio: aac (LC), 44100 Hz, stereo, fltp";
        assert_eq!(parse_video_size(line), None);
        assert_eq!(parse_fps(line), None);
    }

    #[test]
    fn rejects_implausible_dimensions() {
        let line = "  Stream #0:0: Video: h264, yuv420p, 2x2, 30 fps";
        assert_eq!(parse_video_size(line), None);
    }
}
