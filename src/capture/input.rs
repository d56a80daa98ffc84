//! Input tracking channel.
//!
//! A global OS hook feeds mouse and keyboard events into the two CSV logs
//! a session persists next to its screen video. Timestamps are seconds
//! since the session epoch, the same zero-point as frame 0 of the video.
//! Mouse moves are throttled to the session frame interval (the export
//! samples state per frame anyway); presses and releases are never
//! dropped, since a missing transition would corrupt every snapshot
//! derived after it.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex as ParkingMutex;

use crate::events::types::{self, KeyboardRow, MouseRow};
use crate::recorder::channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};

/// File names of the event logs inside a session directory.
pub const MOUSE_FILE: &str = "mouse_events.csv";
pub const KEYBOARD_FILE: &str = "keyboard_events.csv";

const MOUSE_HEADERS: [&str; 7] = [
    "timestamp",
    "event_type",
    "x",
    "y",
    "button",
    "scroll_dx",
    "scroll_dy",
];
const KEYBOARD_HEADERS: [&str; 3] = ["timestamp", "event_type", "key"];

type HookSlot = Arc<ParkingMutex<Option<EventSink>>>;

static HOOK: OnceLock<HookSlot> = OnceLock::new();

/// Install the process-wide input hook on first use.
///
/// The hook thread runs for the rest of the process and forwards events to
/// whatever sink currently occupies the slot; between sessions the slot is
/// empty and events are discarded.
// TODO: rdev offers no way to unhook a listener, so the hook thread
// outlives the session; it just goes quiet once the sink is cleared.
fn ensure_hook() -> RecordingResult<HookSlot> {
    if let Some(slot) = HOOK.get() {
        return Ok(slot.clone());
    }

    let slot: HookSlot = Arc::new(ParkingMutex::new(None));
    let callback_slot = slot.clone();
    std::thread::Builder::new()
        .name("iolens-input-hook".to_string())
        .spawn(move || {
            let result = rdev::listen(move |event| {
                if let Some(sink) = callback_slot.lock().as_mut() {
                    sink.handle(&event);
                }
            });
            if let Err(err) = result {
                tracing::error!("input hook terminated: {err:?}");
            }
        })?;

    Ok(HOOK.get_or_init(|| slot).clone())
}

/// Records OS input events into a pair of CSV logs.
pub struct InputTrackingChannel {
    id: String,
    frame_rate: u32,
    output_dir: Option<PathBuf>,
    slot: Option<HookSlot>,
    is_recording: Arc<AtomicBool>,
    output_files: Vec<String>,
}

impl InputTrackingChannel {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            id: "input".to_string(),
            frame_rate,
            output_dir: None,
            slot: None,
            is_recording: Arc::new(AtomicBool::new(false)),
            output_files: Vec::new(),
        }
    }
}

#[async_trait]
impl RecordingChannel for InputTrackingChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Input
    }

    async fn initialize(&mut self, output_dir: &Path) -> RecordingResult<()> {
        self.output_dir = Some(output_dir.to_path_buf());
        Ok(())
    }

    async fn start(&mut self) -> RecordingResult<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }
        let output_dir = self.output_dir.clone().ok_or_else(|| {
            RecordingError::ConfigurationError("output directory not set".to_string())
        })?;

        let mouse_path = output_dir.join(MOUSE_FILE);
        let keyboard_path = output_dir.join(KEYBOARD_FILE);
        let sink = EventSink::new(
            SystemTime::now(),
            self.frame_rate,
            File::create(&mouse_path)?,
            File::create(&keyboard_path)?,
        )?;

        let slot = ensure_hook()?;
        *slot.lock() = Some(sink);
        self.slot = Some(slot);
        self.output_files = vec![
            mouse_path.to_string_lossy().into_owned(),
            keyboard_path.to_string_lossy().into_owned(),
        ];
        self.is_recording.store(true, Ordering::SeqCst);

        tracing::info!(fps = self.frame_rate, "input tracking started");
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        if !self.is_recording.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.is_recording.store(false, Ordering::SeqCst);

        let sink = self.slot.take().and_then(|slot| slot.lock().take());
        if let Some(mut sink) = sink {
            sink.finish()
                .map_err(|err| RecordingError::CaptureError(err.to_string()))?;
            tracing::info!(
                mouse_events = sink.mouse_rows,
                keyboard_events = sink.keyboard_rows,
                "input tracking stopped"
            );
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    fn output_files(&self) -> Vec<String> {
        self.output_files.clone()
    }
}

/// Streams hook events into the two CSV writers.
struct EventSink {
    epoch: SystemTime,
    frame_interval: f64,
    last_move_written: f64,
    last_position: (f64, f64),
    pressed_keys: BTreeSet<String>,
    mouse: csv::Writer<File>,
    keyboard: csv::Writer<File>,
    mouse_rows: u64,
    keyboard_rows: u64,
}

impl EventSink {
    fn new(
        epoch: SystemTime,
        frame_rate: u32,
        mouse_file: File,
        keyboard_file: File,
    ) -> RecordingResult<Self> {
        // Headers are written eagerly so even an eventless session leaves
        // well-formed logs behind.
        let mut mouse = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(mouse_file);
        let mut keyboard = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(keyboard_file);
        mouse
            .write_record(MOUSE_HEADERS)
            .and_then(|()| keyboard.write_record(KEYBOARD_HEADERS))
            .map_err(|err| RecordingError::CaptureError(err.to_string()))?;

        Ok(Self {
            epoch,
            frame_interval: 1.0 / f64::from(frame_rate.max(1)),
            last_move_written: f64::NEG_INFINITY,
            last_position: (0.0, 0.0),
            pressed_keys: BTreeSet::new(),
            mouse,
            keyboard,
            mouse_rows: 0,
            keyboard_rows: 0,
        })
    }

    fn handle(&mut self, event: &rdev::Event) {
        // Events stamped before the epoch belong to the previous session.
        let Ok(elapsed) = event.time.duration_since(self.epoch) else {
            return;
        };
        let timestamp = elapsed.as_secs_f64();

        match event.event_type {
            rdev::EventType::MouseMove { x, y } => {
                self.last_position = (x, y);
                if timestamp - self.last_move_written < self.frame_interval {
                    return;
                }
                self.last_move_written = timestamp;
                self.write_mouse(timestamp, types::MOUSE_MOVE, x, y, None, None);
            }
            rdev::EventType::ButtonPress(button) => {
                let (x, y) = self.last_position;
                self.write_mouse(
                    timestamp,
                    types::MOUSE_DOWN,
                    x,
                    y,
                    Some(button_label(&button)),
                    None,
                );
            }
            rdev::EventType::ButtonRelease(button) => {
                let (x, y) = self.last_position;
                self.write_mouse(
                    timestamp,
                    types::MOUSE_UP,
                    x,
                    y,
                    Some(button_label(&button)),
                    None,
                );
            }
            rdev::EventType::Wheel { delta_x, delta_y } => {
                let (x, y) = self.last_position;
                self.write_mouse(
                    timestamp,
                    types::MOUSE_SCROLL,
                    x,
                    y,
                    None,
                    Some((delta_x as f64, delta_y as f64)),
                );
            }
            rdev::EventType::KeyPress(key) => {
                let label = key_label(&key);
                // The OS repeats KeyPress while a key is held; only the
                // first transition is a state change.
                if !self.pressed_keys.insert(label.clone()) {
                    return;
                }
                self.write_keyboard(timestamp, types::KEY_DOWN, label);
            }
            rdev::EventType::KeyRelease(key) => {
                let label = key_label(&key);
                if !self.pressed_keys.remove(&label) {
                    return;
                }
                self.write_keyboard(timestamp, types::KEY_UP, label);
            }
        }
    }

    fn write_mouse(
        &mut self,
        timestamp: f64,
        event_type: &str,
        x: f64,
        y: f64,
        button: Option<String>,
        scroll: Option<(f64, f64)>,
    ) {
        let row = MouseRow {
            timestamp,
            event_type: event_type.to_string(),
            x,
            y,
            button,
            scroll_dx: scroll.map(|s| s.0),
            scroll_dy: scroll.map(|s| s.1),
        };
        if let Err(err) = self.mouse.serialize(&row) {
            tracing::warn!(error = %err, "dropping mouse event");
            return;
        }
        if let Err(err) = self.mouse.flush() {
            tracing::warn!(error = %err, "failed to flush mouse log");
            return;
        }
        self.mouse_rows += 1;
    }

    fn write_keyboard(&mut self, timestamp: f64, event_type: &str, key: String) {
        let row = KeyboardRow {
            timestamp,
            event_type: event_type.to_string(),
            key,
        };
        if let Err(err) = self.keyboard.serialize(&row) {
            tracing::warn!(error = %err, "dropping keyboard event");
            return;
        }
        if let Err(err) = self.keyboard.flush() {
            tracing::warn!(error = %err, "failed to flush keyboard log");
            return;
        }
        self.keyboard_rows += 1;
    }

    fn finish(&mut self) -> std::io::Result<()> {
        self.mouse.flush()?;
        self.keyboard.flush()
    }
}

/// Stable label for a key, decoupled from the hook backend's enum.
///
/// Letters and digits collapse to their character (`KeyA` -> `a`,
/// `Num1` -> `1`); everything else becomes snake_case
/// (`ShiftLeft` -> `shift_left`).
pub(crate) fn key_label(key: &rdev::Key) -> String {
    let raw = format!("{key:?}");
    if let Some(rest) = raw.strip_prefix("Key") {
        if rest.len() == 1 && rest.chars().all(|c| c.is_ascii_alphabetic()) {
            return rest.to_ascii_lowercase();
        }
    }
    if let Some(rest) = raw.strip_prefix("Num") {
        if rest.len() == 1 && rest.chars().all(|c| c.is_ascii_digit()) {
            return rest.to_string();
        }
    }
    camel_to_snake(&raw)
}

pub(crate) fn button_label(button: &rdev::Button) -> String {
    match button {
        rdev::Button::Left => "left".to_string(),
        rdev::Button::Right => "right".to_string(),
        rdev::Button::Middle => "middle".to_string(),
        rdev::Button::Unknown(id) => format!("button_{id}"),
    }
}

fn camel_to_snake(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    for ch in raw.chars() {
        match ch {
            'A'..='Z' => {
                if !out.is_empty() && !out.ends_with('_') {
                    out.push('_');
                }
                out.push(ch.to_ascii_lowercase());
            }
            '(' => {
                if !out.ends_with('_') {
                    out.push('_');
                }
            }
            ')' => {}
            _ => out.push(ch),
        }
    }
    out
}
