//! Loading persisted event logs.
//!
//! Each recording session leaves two CSV logs behind (mouse and keyboard).
//! Loading converts every row into a [`TimedEvent`] or fails the whole log:
//! a row the schema cannot account for means the recording is not
//! trustworthy, and a silently skipped transition would corrupt every
//! snapshot derived after it.

use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::events::types::{self, EventKind, KeyboardRow, MouseRow, TimedEvent};

/// Errors raised while loading a persisted event log.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("failed to read event log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed row in {path} at line {line}: {reason}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

/// A time-ordered, read-only sequence of events from one input source.
///
/// The loader stable-sorts rows by timestamp, so the non-decreasing
/// invariant holds even when the capture writer flushed buffers out of
/// order. Timestamps are kept relative to the recording epoch as written;
/// no re-normalization happens across logs.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<TimedEvent>,
}

impl EventLog {
    /// Load a mouse event log (`timestamp,event_type,x,y,button,scroll_dx,scroll_dy`).
    pub fn load_mouse(path: &Path) -> Result<Self, LogError> {
        Self::load_with(path, event_from_mouse_row)
    }

    /// Load a keyboard event log (`timestamp,event_type,key`).
    pub fn load_keyboard(path: &Path) -> Result<Self, LogError> {
        Self::load_with(path, event_from_keyboard_row)
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn load_with<R, F>(path: &Path, convert: F) -> Result<Self, LogError>
    where
        R: serde::de::DeserializeOwned,
        F: Fn(R) -> Result<TimedEvent, String>,
    {
        let file = File::open(path).map_err(|source| LogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = csv::Reader::from_reader(file);
        let mut events = Vec::new();

        for (index, row) in reader.deserialize::<R>().enumerate() {
            // Line 1 is the header.
            let line = index as u64 + 2;
            let row = row.map_err(|err| malformed(path, line, err))?;
            let event = convert(row).map_err(|reason| LogError::MalformedRow {
                path: path.to_path_buf(),
                line,
                reason,
            })?;
            events.push(event);
        }

        Ok(Self::from_events(events))
    }

    /// Build a log from already-collected events.
    ///
    /// Sorts by timestamp (stable, so events sharing a timestamp keep
    /// their given order), the same normalization loading applies.
    pub fn from_events(mut events: Vec<TimedEvent>) -> Self {
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self { events }
    }
}

fn malformed(path: &Path, line: u64, err: csv::Error) -> LogError {
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => LogError::Io {
            path: path.to_path_buf(),
            source,
        },
        _ => LogError::MalformedRow {
            path: path.to_path_buf(),
            line,
            reason,
        },
    }
}

fn event_from_mouse_row(row: MouseRow) -> Result<TimedEvent, String> {
    let timestamp = valid_timestamp(row.timestamp)?;
    let kind = match row.event_type.as_str() {
        types::MOUSE_MOVE => EventKind::MouseMove { x: row.x, y: row.y },
        types::MOUSE_DOWN => EventKind::MouseDown {
            button: required(row.button, "button")?,
        },
        types::MOUSE_UP => EventKind::MouseUp {
            button: required(row.button, "button")?,
        },
        types::MOUSE_SCROLL => EventKind::MouseScroll {
            dx: row.scroll_dx.ok_or("missing scroll_dx")?,
            dy: row.scroll_dy.ok_or("missing scroll_dy")?,
        },
        other => return Err(format!("unknown mouse event type '{other}'")),
    };
    Ok(TimedEvent { timestamp, kind })
}

fn event_from_keyboard_row(row: KeyboardRow) -> Result<TimedEvent, String> {
    let timestamp = valid_timestamp(row.timestamp)?;
    if row.key.is_empty() {
        return Err("missing key".to_string());
    }
    let kind = match row.event_type.as_str() {
        types::KEY_DOWN => EventKind::KeyDown { key: row.key },
        types::KEY_UP => EventKind::KeyUp { key: row.key },
        other => return Err(format!("unknown keyboard event type '{other}'")),
    };
    Ok(TimedEvent { timestamp, kind })
}

fn valid_timestamp(timestamp: f64) -> Result<f64, String> {
    if !timestamp.is_finite() {
        return Err(format!("non-finite timestamp {timestamp}"));
    }
    Ok(timestamp)
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(format!("missing {field}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_log(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write log");
        file
    }

    #[test]
    fn loads_mouse_events_in_order() {
        let file = write_log(
            "timestamp,event_type,x,y,button,scroll_dx,scroll_dy\n\
             0.000,mouse_move,10,20,,,\n\
             0.150,mouse_down,12,22,left,,\n\
             0.200,mouse_scroll,12,22,,0,-1\n\
             0.300,mouse_up,12,22,left,,\n",
        );

        let log = EventLog::load_mouse(file.path()).expect("load");
        assert_eq!(log.len(), 4);
        assert_eq!(
            log.events()[0].kind,
            EventKind::MouseMove { x: 10.0, y: 20.0 }
        );
        assert_eq!(
            log.events()[1].kind,
            EventKind::MouseDown {
                button: "left".to_string()
            }
        );
        assert_eq!(
            log.events()[2].kind,
            EventKind::MouseScroll { dx: 0.0, dy: -1.0 }
        );
    }

    #[test]
    fn sorts_out_of_order_rows() {
        let file = write_log(
            "timestamp,event_type,key\n\
             1.000,key_up,a\n\
             0.500,key_down,a\n",
        );

        let log = EventLog::load_keyboard(file.path()).expect("load");
        assert_eq!(log.events()[0].timestamp, 0.5);
        assert_eq!(log.events()[1].timestamp, 1.0);
    }

    #[test]
    fn non_numeric_timestamp_is_malformed() {
        let file = write_log(
            "timestamp,event_type,key\n\
             0.000,key_down,a\n\
             oops,key_up,a\n",
        );

        let err = EventLog::load_keyboard(file.path()).unwrap_err();
        match err {
            LogError::MalformedRow { line, .. } => assert_eq!(line, 3),
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_type_is_malformed() {
        let file = write_log(
            "timestamp,event_type,x,y,button,scroll_dx,scroll_dy\n\
             0.000,mouse_teleport,10,20,,,\n",
        );

        let err = EventLog::load_mouse(file.path()).unwrap_err();
        match err {
            LogError::MalformedRow { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("mouse_teleport"), "reason: {reason}");
            }
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn click_without_button_is_malformed() {
        let file = write_log(
            "timestamp,event_type,x,y,button,scroll_dx,scroll_dy\n\
             0.000,mouse_down,10,20,,,\n",
        );

        let err = EventLog::load_mouse(file.path()).unwrap_err();
        assert!(matches!(err, LogError::MalformedRow { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EventLog::load_mouse(Path::new("/nonexistent/mouse.csv")).unwrap_err();
        assert!(matches!(err, LogError::Io { .. }));
    }
}
