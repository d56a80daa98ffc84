//! Input playback.
//!
//! Replays the cursor trajectory of a recorded mouse log on the live
//! pointer, preserving the recorded inter-event timing scaled by a speed
//! factor. Only mouse movement is synthesized; replaying clicks and
//! keystrokes against whatever happens to be on screen is a different kind
//! of tool.

use thiserror::Error;

use crate::events::{EventKind, EventLog};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("playback speed must be positive, got {0}")]
    InvalidSpeed(f64),

    #[error("the log contains no mouse movement to replay")]
    NothingToReplay,

    #[error("failed to synthesize input event: {0:?}")]
    Simulate(rdev::SimulateError),
}

/// Replays a recorded mouse trajectory.
pub struct InputPlayer {
    moves: Vec<(f64, f64, f64)>,
    speed: f64,
}

impl InputPlayer {
    /// Extract the movement trajectory from a loaded mouse log.
    pub fn from_log(log: &EventLog, speed: f64) -> Result<Self, ReplayError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ReplayError::InvalidSpeed(speed));
        }
        let moves: Vec<(f64, f64, f64)> = log
            .events()
            .iter()
            .filter_map(|event| match event.kind {
                EventKind::MouseMove { x, y } => Some((event.timestamp, x, y)),
                _ => None,
            })
            .collect();
        if moves.is_empty() {
            return Err(ReplayError::NothingToReplay);
        }
        Ok(Self { moves, speed })
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Drive the live cursor along the trajectory. Blocks until done.
    pub fn play(&self) -> Result<(), ReplayError> {
        tracing::info!(
            moves = self.moves.len(),
            speed = self.speed,
            "replaying mouse trajectory"
        );

        let mut previous_t = self.moves[0].0;
        for &(t, x, y) in &self.moves {
            let gap = (t - previous_t).max(0.0) / self.speed;
            if gap > 0.0 {
                std::thread::sleep(std::time::Duration::from_secs_f64(gap));
            }
            rdev::simulate(&rdev::EventType::MouseMove { x, y }).map_err(ReplayError::Simulate)?;
            previous_t = t;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TimedEvent;

    fn mouse_log() -> EventLog {
        EventLog::from_events(vec![
            TimedEvent {
                timestamp: 0.0,
                kind: EventKind::MouseMove { x: 1.0, y: 2.0 },
            },
            TimedEvent {
                timestamp: 0.5,
                kind: EventKind::MouseDown {
                    button: "left".to_string(),
                },
            },
            TimedEvent {
                timestamp: 1.0,
                kind: EventKind::MouseMove { x: 3.0, y: 4.0 },
            },
        ])
    }

    #[test]
    fn trajectory_keeps_only_moves() {
        let player = InputPlayer::from_log(&mouse_log(), 1.0).expect("player");
        assert_eq!(player.len(), 2);
    }

    #[test]
    fn rejects_non_positive_speed() {
        assert!(matches!(
            InputPlayer::from_log(&mouse_log(), 0.0),
            Err(ReplayError::InvalidSpeed(_))
        ));
        assert!(matches!(
            InputPlayer::from_log(&mouse_log(), -2.0),
            Err(ReplayError::InvalidSpeed(_))
        ));
    }

    #[test]
    fn empty_trajectory_is_an_error() {
        let log = EventLog::from_events(vec![TimedEvent {
            timestamp: 0.0,
            kind: EventKind::KeyDown {
                key: "a".to_string(),
            },
        }]);
        assert!(matches!(
            InputPlayer::from_log(&log, 1.0),
            Err(ReplayError::NothingToReplay)
        ));
    }
}
