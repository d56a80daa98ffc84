//! Recording session lifecycle
//!
//! A session owns its channels and drives them through an explicit
//! start/stop lifecycle, so there is no ambient capture state: everything
//! a recording produces hangs off the session directory it creates.

pub mod channel;
pub mod session;

pub use channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
pub use session::{RecordingSession, SessionManifest};
