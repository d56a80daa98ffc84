//! Recording session coordinator.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::recorder::channel::{RecordingChannel, RecordingError, RecordingResult};

/// Metadata written next to a session's outputs as `session.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionManifest {
    pub frame_rate: u32,
    /// Wall-clock session start; the timestamps inside the event logs are
    /// relative to this epoch, as is frame 0 of the screen video.
    pub started_at: String,
    pub stopped_at: String,
    pub files: Vec<String>,
}

/// An explicit capture session with a start/stop lifecycle.
///
/// Creates a timestamped directory under the output root, runs every added
/// channel against the shared epoch and writes the manifest on stop. One
/// session records at a time; a second `start` without a `stop` is an
/// error, not a silent restart.
pub struct RecordingSession {
    output_root: PathBuf,
    frame_rate: u32,
    channels: Vec<Box<dyn RecordingChannel>>,
    session_dir: Option<PathBuf>,
    started_at: Option<chrono::DateTime<chrono::Local>>,
}

impl RecordingSession {
    pub fn new(output_root: impl Into<PathBuf>, frame_rate: u32) -> Self {
        Self {
            output_root: output_root.into(),
            frame_rate,
            channels: Vec::new(),
            session_dir: None,
            started_at: None,
        }
    }

    pub fn add_channel(&mut self, channel: Box<dyn RecordingChannel>) {
        self.channels.push(channel);
    }

    pub fn is_recording(&self) -> bool {
        self.session_dir.is_some()
    }

    /// Create the session directory and start every channel.
    ///
    /// Returns the session directory. If any channel fails to start, the
    /// ones already running are stopped before the error surfaces.
    pub async fn start(&mut self) -> RecordingResult<PathBuf> {
        if self.is_recording() {
            return Err(RecordingError::AlreadyRecording);
        }
        if self.frame_rate == 0 {
            return Err(RecordingError::ConfigurationError(
                "frame rate must be positive".to_string(),
            ));
        }

        let started_at = chrono::Local::now();
        let session_dir = self
            .output_root
            .join(format!("recording_{}", started_at.format("%Y%m%d_%H%M%S")));
        std::fs::create_dir_all(&session_dir)?;

        for channel in &mut self.channels {
            channel.initialize(&session_dir).await?;
        }

        for index in 0..self.channels.len() {
            if let Err(err) = self.channels[index].start().await {
                tracing::error!(
                    channel = self.channels[index].id(),
                    error = %err,
                    "channel failed to start; stopping session"
                );
                for started in &mut self.channels[..index] {
                    let _ = started.stop().await;
                }
                return Err(err);
            }
            tracing::info!(
                channel = self.channels[index].id(),
                kind = %self.channels[index].channel_type(),
                "channel started"
            );
        }

        self.started_at = Some(started_at);
        self.session_dir = Some(session_dir.clone());
        tracing::info!(session = %session_dir.display(), "recording started");
        Ok(session_dir)
    }

    /// Stop every channel, write the manifest and return it.
    ///
    /// Channels are always all stopped, even when one of them fails; the
    /// first failure is reported after the rest have been shut down.
    pub async fn stop(&mut self) -> RecordingResult<SessionManifest> {
        let session_dir = self
            .session_dir
            .take()
            .ok_or(RecordingError::NotRecording)?;
        let started_at = self.started_at.take().unwrap_or_else(chrono::Local::now);

        let mut first_error = None;
        let mut files = Vec::new();
        for channel in &mut self.channels {
            if let Err(err) = channel.stop().await {
                tracing::error!(channel = channel.id(), error = %err, "channel failed to stop");
                first_error.get_or_insert(err);
            }
            files.extend(channel.output_files());
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let manifest = SessionManifest {
            frame_rate: self.frame_rate,
            started_at: started_at.to_rfc3339(),
            stopped_at: chrono::Local::now().to_rfc3339(),
            files,
        };
        write_manifest(&session_dir.join("session.json"), &manifest)?;

        tracing::info!(
            session = %session_dir.display(),
            files = manifest.files.len(),
            "recording stopped"
        );
        Ok(manifest)
    }
}

fn write_manifest(path: &Path, manifest: &SessionManifest) -> RecordingResult<()> {
    let data = serde_json::to_vec_pretty(manifest)
        .map_err(|err| RecordingError::ConfigurationError(err.to_string()))?;
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::channel::ChannelType;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FakeChannel {
        id: String,
        recording: Arc<AtomicBool>,
        fail_start: bool,
    }

    impl FakeChannel {
        fn new(id: &str, fail_start: bool) -> (Self, Arc<AtomicBool>) {
            let recording = Arc::new(AtomicBool::new(false));
            (
                Self {
                    id: id.to_string(),
                    recording: recording.clone(),
                    fail_start,
                },
                recording,
            )
        }
    }

    #[async_trait]
    impl RecordingChannel for FakeChannel {
        fn id(&self) -> &str {
            &self.id
        }

        fn channel_type(&self) -> ChannelType {
            ChannelType::Input
        }

        async fn initialize(&mut self, _output_dir: &Path) -> RecordingResult<()> {
            Ok(())
        }

        async fn start(&mut self) -> RecordingResult<()> {
            if self.fail_start {
                return Err(RecordingError::CaptureError("boom".to_string()));
            }
            self.recording.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&mut self) -> RecordingResult<()> {
            self.recording.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_recording(&self) -> bool {
            self.recording.load(Ordering::SeqCst)
        }

        fn output_files(&self) -> Vec<String> {
            vec![format!("{}.out", self.id)]
        }
    }

    #[tokio::test]
    async fn start_stop_writes_manifest_with_channel_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut session = RecordingSession::new(dir.path(), 30);
        let (channel, _) = FakeChannel::new("input", false);
        session.add_channel(Box::new(channel));

        let session_dir = session.start().await.expect("start");
        assert!(session.is_recording());

        let manifest = session.stop().await.expect("stop");
        assert!(!session.is_recording());
        assert_eq!(manifest.files, vec!["input.out".to_string()]);
        assert!(session_dir.join("session.json").exists());
    }

    #[tokio::test]
    async fn failed_start_stops_already_running_channels() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut session = RecordingSession::new(dir.path(), 30);
        let (good, good_flag) = FakeChannel::new("good", false);
        let (bad, _) = FakeChannel::new("bad", true);
        session.add_channel(Box::new(good));
        session.add_channel(Box::new(bad));

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, RecordingError::CaptureError(_)));
        assert!(!session.is_recording());
        assert!(!good_flag.load(Ordering::SeqCst), "good channel left running");
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut session = RecordingSession::new(dir.path(), 30);
        session.start().await.expect("start");
        assert!(matches!(
            session.start().await.unwrap_err(),
            RecordingError::AlreadyRecording
        ));
    }

    #[tokio::test]
    async fn stop_without_start_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut session = RecordingSession::new(dir.path(), 30);
        assert!(matches!(
            session.stop().await.unwrap_err(),
            RecordingError::NotRecording
        ));
    }

    #[tokio::test]
    async fn zero_frame_rate_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut session = RecordingSession::new(dir.path(), 0);
        assert!(matches!(
            session.start().await.unwrap_err(),
            RecordingError::ConfigurationError(_)
        ));
    }
}
