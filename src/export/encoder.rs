//! Streaming video encode through an ffmpeg child process.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use super::{drain_stderr, ExportError, FrameSink};
use crate::export::decoder::VideoMetadata;
use crate::processing::FrameBuffer;

/// Appends raw RGB24 frames to an ffmpeg child encoding mp4/libx264.
///
/// Frames must arrive in presentation order; the container is only valid
/// after [`FrameSink::finish`] succeeds. The caller is responsible for
/// removing the output file when the export fails partway.
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    output: PathBuf,
    frame_len: usize,
    finished: bool,
}

impl FfmpegEncoder {
    /// Spawn the encode child writing to `output` with the source's
    /// dimensions and frame rate, so the result stays frame-for-frame
    /// aligned with the input.
    pub fn create(output: &Path, metadata: &VideoMetadata) -> Result<Self, ExportError> {
        let mut child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s:v")
            .arg(format!("{}x{}", metadata.width, metadata.height))
            .arg("-r")
            .arg(format!("{}", metadata.fps))
            .arg("-i")
            .arg("-")
            .arg("-an")
            .arg("-c:v")
            .arg("libx264")
            .arg("-preset")
            .arg("medium")
            .arg("-crf")
            .arg("18")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    ExportError::OutputWrite(
                        "ffmpeg was not found on PATH; install ffmpeg and verify \
                         `ffmpeg -version` works"
                            .to_string(),
                    )
                } else {
                    ExportError::OutputWrite(format!("failed to start ffmpeg encoder: {err}"))
                }
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ExportError::OutputWrite("failed to capture ffmpeg encoder stdin".to_string())
        })?;
        let stderr = child.stderr.take().map(drain_stderr);

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr,
            output: output.to_path_buf(),
            frame_len: metadata.width as usize * metadata.height as usize * 3,
            finished: false,
        })
    }

    fn stderr_tail(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &FrameBuffer) -> Result<(), ExportError> {
        if frame.data().len() != self.frame_len {
            return Err(ExportError::OutputWrite(format!(
                "frame size mismatch: got {} bytes, encoder expects {}",
                frame.data().len(),
                self.frame_len
            )));
        }
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            ExportError::OutputWrite("encoder already finished".to_string())
        })?;
        stdin.write_all(frame.data()).map_err(|err| {
            ExportError::OutputWrite(format!("failed writing frame to ffmpeg: {err}"))
        })
    }

    fn finish(&mut self) -> Result<(), ExportError> {
        // Closing stdin signals end-of-stream; ffmpeg then finalizes the
        // container and exits.
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().map_err(|err| {
                ExportError::OutputWrite(format!("failed flushing ffmpeg stdin: {err}"))
            })?;
        }
        let status = self.child.wait().map_err(|err| {
            ExportError::OutputWrite(format!("failed to wait for ffmpeg encoder: {err}"))
        })?;
        self.finished = true;
        if !status.success() {
            let tail = self.stderr_tail();
            return Err(ExportError::OutputWrite(format!(
                "ffmpeg encoder exited with {status}: {tail}"
            )));
        }
        tracing::debug!(output = %self.output.display(), "encode stream finalized");
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if !self.finished {
            // Abandoned mid-export: kill the child rather than leave it
            // blocked on a stdin that will never close.
            drop(self.stdin.take());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
