//! The transcription relay core
//!
//! Per-appointment, per-user sessions that forward browser audio to an
//! external speech recognizer and fan finalized transcript segments out to
//! live viewers:
//!
//! ```text
//! browser ──POST audio──▶ SessionManager ──ws──▶ recognizer
//!                              │                     │
//!                              │   final Results ◀───┘
//!                              ▼
//!                       TranscriptStore (persist, happens-before)
//!                              ▼
//!                       TranscriptBroadcaster ──▶ every live viewer (SSE)
//! ```

pub mod broadcast;
pub mod memory_store;
pub mod session;
pub mod store;

pub use broadcast::{Subscription, TranscriptBroadcaster};
pub use session::{OverflowPolicy, PendingAudioQueue, PendingAudioSettings, SessionManager};
pub use store::{StoreError, TranscriptSegment, TranscriptStore};

/// Identity pairing a clinician and an appointment.
///
/// Scopes at most one live recognizer socket and one viewer set at any
/// time. Exists only in process memory for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub appointment_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, appointment_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            appointment_id: appointment_id.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.user_id, self.appointment_id)
    }
}
