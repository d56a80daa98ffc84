//! State reconstruction from sparse transition logs.
//!
//! The logs only record transitions (a key went down, the cursor moved);
//! the overlay needs the live state as of each frame's timestamp. Folding
//! the whole log per frame would be O(frames x events), so each log gets a
//! retained forward cursor advanced alongside the frame loop: every event
//! is applied exactly once across the whole conversion.

use std::collections::BTreeSet;

use crate::events::{EventKind, EventLog, TimedEvent};

/// Reconstructed input state as of a single query timestamp.
///
/// A key or button is present iff its most recent transition at or before
/// the query time was a Down with no intervening Up. `BTreeSet` keeps the
/// label order deterministic for rendering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateSnapshot {
    /// Last known cursor position, or `None` before the first move.
    pub cursor: Option<(f64, f64)>,
    pub pressed_keys: BTreeSet<String>,
    pub pressed_buttons: BTreeSet<String>,
}

/// Forward-only fold over one event log.
///
/// Queries must be non-decreasing across calls; the frame timeline
/// guarantees that in the export loop. Events with `timestamp <= t` are
/// applied, so a release logged exactly at a frame's timestamp is already
/// reflected in that frame.
#[derive(Debug)]
pub struct LogReplay<'a> {
    events: &'a [TimedEvent],
    next: usize,
    cursor: Option<(f64, f64)>,
    pressed_keys: BTreeSet<String>,
    pressed_buttons: BTreeSet<String>,
}

impl<'a> LogReplay<'a> {
    pub fn new(log: &'a EventLog) -> Self {
        Self {
            events: log.events(),
            next: 0,
            cursor: None,
            pressed_keys: BTreeSet::new(),
            pressed_buttons: BTreeSet::new(),
        }
    }

    /// Fold every not-yet-applied event with `timestamp <= t`.
    pub fn advance_to(&mut self, t: f64) {
        while let Some(event) = self.events.get(self.next) {
            if event.timestamp > t {
                break;
            }
            self.apply(&event.kind);
            self.next += 1;
        }
    }

    fn apply(&mut self, kind: &EventKind) {
        match kind {
            EventKind::MouseMove { x, y } => self.cursor = Some((*x, *y)),
            EventKind::MouseDown { button } => {
                self.pressed_buttons.insert(button.clone());
            }
            EventKind::MouseUp { button } => {
                // A release for a button we never saw pressed is a no-op;
                // the matching press may have been dropped by the capture.
                self.pressed_buttons.remove(button);
            }
            EventKind::KeyDown { key } => {
                self.pressed_keys.insert(key.clone());
            }
            EventKind::KeyUp { key } => {
                self.pressed_keys.remove(key);
            }
            // Scrolling is transient; it leaves no persistent state.
            EventKind::MouseScroll { .. } => {}
        }
    }
}

/// Merges the mouse and keyboard replays into per-frame snapshots.
pub struct InputStateTracker<'a> {
    mouse: LogReplay<'a>,
    keyboard: LogReplay<'a>,
}

impl<'a> InputStateTracker<'a> {
    pub fn new(mouse: &'a EventLog, keyboard: &'a EventLog) -> Self {
        Self {
            mouse: LogReplay::new(mouse),
            keyboard: LogReplay::new(keyboard),
        }
    }

    /// Advance both logs to `t` and return the merged state.
    ///
    /// Before the first event of either log this is the unset state: no
    /// cursor, empty pressed sets. Past the final event the last known
    /// state holds (logs shorter than the video clamp rather than fail).
    pub fn snapshot_at(&mut self, t: f64) -> StateSnapshot {
        self.mouse.advance_to(t);
        self.keyboard.advance_to(t);

        let mut pressed_keys = self.mouse.pressed_keys.clone();
        pressed_keys.extend(self.keyboard.pressed_keys.iter().cloned());
        let mut pressed_buttons = self.mouse.pressed_buttons.clone();
        pressed_buttons.extend(self.keyboard.pressed_buttons.iter().cloned());

        StateSnapshot {
            cursor: self.mouse.cursor.or(self.keyboard.cursor),
            pressed_keys,
            pressed_buttons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(events: Vec<TimedEvent>) -> EventLog {
        EventLog::from_events(events)
    }

    fn mouse_move(timestamp: f64, x: f64, y: f64) -> TimedEvent {
        TimedEvent {
            timestamp,
            kind: EventKind::MouseMove { x, y },
        }
    }

    fn key(timestamp: f64, key: &str, down: bool) -> TimedEvent {
        TimedEvent {
            timestamp,
            kind: if down {
                EventKind::KeyDown {
                    key: key.to_string(),
                }
            } else {
                EventKind::KeyUp {
                    key: key.to_string(),
                }
            },
        }
    }

    fn button(timestamp: f64, name: &str, down: bool) -> TimedEvent {
        TimedEvent {
            timestamp,
            kind: if down {
                EventKind::MouseDown {
                    button: name.to_string(),
                }
            } else {
                EventKind::MouseUp {
                    button: name.to_string(),
                }
            },
        }
    }

    #[test]
    fn three_frame_scenario_matches_expected_snapshots() {
        // 3 frames at 1 fps; the release at t=2.0 applies at <= t.
        let mouse = log(vec![mouse_move(0.0, 10.0, 10.0), mouse_move(1.5, 20.0, 20.0)]);
        let keyboard = log(vec![key(0.5, "a", true), key(2.0, "a", false)]);
        let mut tracker = InputStateTracker::new(&mouse, &keyboard);

        let frame0 = tracker.snapshot_at(0.0);
        assert_eq!(frame0.cursor, Some((10.0, 10.0)));
        assert!(frame0.pressed_keys.is_empty());

        let frame1 = tracker.snapshot_at(1.0);
        assert_eq!(frame1.cursor, Some((10.0, 10.0)));
        assert!(frame1.pressed_keys.contains("a"));

        let frame2 = tracker.snapshot_at(2.0);
        assert_eq!(frame2.cursor, Some((20.0, 20.0)));
        assert!(frame2.pressed_keys.is_empty());
    }

    #[test]
    fn query_before_first_event_is_unset() {
        let mouse = log(vec![mouse_move(5.0, 1.0, 1.0)]);
        let keyboard = log(vec![key(5.0, "a", true)]);
        let mut tracker = InputStateTracker::new(&mouse, &keyboard);

        let snapshot = tracker.snapshot_at(1.0);
        assert_eq!(snapshot, StateSnapshot::default());
    }

    #[test]
    fn release_without_press_is_a_no_op() {
        let keyboard = log(vec![key(0.5, "ghost", false), key(1.0, "a", true)]);
        let empty = EventLog::default();
        let mut tracker = InputStateTracker::new(&empty, &keyboard);

        let snapshot = tracker.snapshot_at(2.0);
        assert!(!snapshot.pressed_keys.contains("ghost"));
        assert!(snapshot.pressed_keys.contains("a"));
    }

    #[test]
    fn cursor_is_last_move_at_or_before_query() {
        let mouse = log(vec![
            mouse_move(0.0, 1.0, 1.0),
            mouse_move(1.0, 2.0, 2.0),
            mouse_move(2.0, 3.0, 3.0),
        ]);
        let empty = EventLog::default();
        let mut tracker = InputStateTracker::new(&mouse, &empty);

        assert_eq!(tracker.snapshot_at(1.0).cursor, Some((2.0, 2.0)));
        // Past the end of the log the last known position holds.
        assert_eq!(tracker.snapshot_at(10.0).cursor, Some((3.0, 3.0)));
    }

    #[test]
    fn buttons_track_press_and_release() {
        let mouse = log(vec![
            button(0.0, "left", true),
            button(0.5, "right", true),
            button(1.0, "left", false),
        ]);
        let empty = EventLog::default();
        let mut tracker = InputStateTracker::new(&mouse, &empty);

        let mid = tracker.snapshot_at(0.75);
        assert!(mid.pressed_buttons.contains("left"));
        assert!(mid.pressed_buttons.contains("right"));

        let late = tracker.snapshot_at(1.0);
        assert!(!late.pressed_buttons.contains("left"));
        assert!(late.pressed_buttons.contains("right"));
    }

    #[test]
    fn events_are_applied_exactly_once_across_queries() {
        // Down then Up of the same key across two queries: if the fold
        // restarted from the beginning the second query would re-press it.
        let keyboard = log(vec![key(0.0, "a", true), key(1.0, "a", false)]);
        let empty = EventLog::default();
        let mut tracker = InputStateTracker::new(&empty, &keyboard);

        assert!(tracker.snapshot_at(0.5).pressed_keys.contains("a"));
        assert!(tracker.snapshot_at(1.5).pressed_keys.is_empty());
        assert!(tracker.snapshot_at(2.5).pressed_keys.is_empty());
    }
}
