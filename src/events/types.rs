use serde::{Deserialize, Serialize};

/// Wire name of each event kind as it appears in the `event_type` column.
pub const MOUSE_MOVE: &str = "mouse_move";
pub const MOUSE_DOWN: &str = "mouse_down";
pub const MOUSE_UP: &str = "mouse_up";
pub const MOUSE_SCROLL: &str = "mouse_scroll";
pub const KEY_DOWN: &str = "key_down";
pub const KEY_UP: &str = "key_up";

/// One timestamped input transition.
///
/// Timestamps are seconds since recording start (the session epoch shared
/// with frame 0 of the screen video). Events are immutable once logged;
/// repeated timestamps are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub timestamp: f64,
    pub kind: EventKind,
}

/// Input transition payloads.
///
/// Keys and buttons carry stable human-readable labels (`"a"`,
/// `"shift_left"`, `"left"`) so the log model stays independent of whatever
/// backend captured them.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    MouseMove { x: f64, y: f64 },
    MouseDown { button: String },
    MouseUp { button: String },
    MouseScroll { dx: f64, dy: f64 },
    KeyDown { key: String },
    KeyUp { key: String },
}

/// One row of the persisted mouse log
/// (`timestamp,event_type,x,y,button,scroll_dx,scroll_dy`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MouseRow {
    pub timestamp: f64,
    pub event_type: String,
    pub x: f64,
    pub y: f64,
    pub button: Option<String>,
    pub scroll_dx: Option<f64>,
    pub scroll_dy: Option<f64>,
}

/// One row of the persisted keyboard log (`timestamp,event_type,key`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyboardRow {
    pub timestamp: f64,
    pub event_type: String,
    pub key: String,
}
