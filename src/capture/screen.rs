//! Screen capture channel.
//!
//! Delegates the actual grabbing and encoding to an ffmpeg child process
//! using the platform's screen-grab input device. The child runs for the
//! whole session and is stopped by sending `q` on its stdin, which lets
//! ffmpeg finalize the container cleanly.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use async_trait::async_trait;

use crate::recorder::channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};

/// File name of the screen recording inside a session directory.
pub const SCREEN_FILE: &str = "screen.mp4";

pub struct ScreenCaptureChannel {
    id: String,
    frame_rate: u32,
    output_path: Option<PathBuf>,
    child: Option<Child>,
}

impl ScreenCaptureChannel {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            id: "display".to_string(),
            frame_rate,
            output_path: None,
            child: None,
        }
    }

    #[cfg(target_os = "linux")]
    fn grab_args(&self, output: &Path) -> RecordingResult<Vec<String>> {
        let (width, height) = rdev::display_size()
            .map_err(|err| RecordingError::CaptureError(format!("display size: {err:?}")))?;
        Ok(vec![
            "-f".into(),
            "x11grab".into(),
            "-draw_mouse".into(),
            "1".into(),
            "-s".into(),
            format!("{width}x{height}"),
            "-i".into(),
            ":0.0".into(),
            "-c:v".into(),
            "libx264".into(),
            "-r".into(),
            self.frame_rate.to_string(),
            output.to_string_lossy().into_owned(),
        ])
    }

    #[cfg(target_os = "macos")]
    fn grab_args(&self, output: &Path) -> RecordingResult<Vec<String>> {
        Ok(vec![
            "-f".into(),
            "avfoundation".into(),
            "-capture_cursor".into(),
            "1".into(),
            "-i".into(),
            "1:none".into(),
            "-c:v".into(),
            "libx264".into(),
            "-r".into(),
            self.frame_rate.to_string(),
            output.to_string_lossy().into_owned(),
        ])
    }

    #[cfg(target_os = "windows")]
    fn grab_args(&self, output: &Path) -> RecordingResult<Vec<String>> {
        Ok(vec![
            "-f".into(),
            "gdigrab".into(),
            "-draw_mouse".into(),
            "1".into(),
            "-i".into(),
            "desktop".into(),
            "-c:v".into(),
            "libx264".into(),
            "-r".into(),
            self.frame_rate.to_string(),
            output.to_string_lossy().into_owned(),
        ])
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    fn grab_args(&self, _output: &Path) -> RecordingResult<Vec<String>> {
        Err(RecordingError::ConfigurationError(
            "screen capture is not supported on this platform".to_string(),
        ))
    }
}

#[async_trait]
impl RecordingChannel for ScreenCaptureChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Display
    }

    async fn initialize(&mut self, output_dir: &Path) -> RecordingResult<()> {
        self.output_path = Some(output_dir.join(SCREEN_FILE));
        Ok(())
    }

    async fn start(&mut self) -> RecordingResult<()> {
        if self.child.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }
        let output = self.output_path.clone().ok_or_else(|| {
            RecordingError::ConfigurationError("output directory not set".to_string())
        })?;

        let args = self.grab_args(&output)?;
        let child = Command::new("ffmpeg")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    RecordingError::CaptureError(
                        "ffmpeg was not found on PATH; install ffmpeg to record the screen"
                            .to_string(),
                    )
                } else {
                    RecordingError::CaptureError(format!("failed to start ffmpeg: {err}"))
                }
            })?;

        self.child = Some(child);
        tracing::info!(output = %output.display(), fps = self.frame_rate, "screen capture started");
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        // `q` asks ffmpeg to stop grabbing and finalize the container;
        // killing it instead would leave an unreadable file.
        if let Some(stdin) = child.stdin.as_mut() {
            use std::io::Write;
            let _ = stdin.write_all(b"q\n");
        }
        drop(child.stdin.take());
        let status = child.wait()?;
        if !status.success() {
            return Err(RecordingError::CaptureError(format!(
                "ffmpeg screen grab exited with {status}"
            )));
        }

        tracing::info!("screen capture stopped");
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.child.is_some()
    }

    fn output_files(&self) -> Vec<String> {
        self.output_path
            .iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect()
    }
}
