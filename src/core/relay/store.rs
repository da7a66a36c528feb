//! Transcript persistence seam
//!
//! The relay treats the durable document store as an external collaborator:
//! appends may fail without taking the session down, and reads may lag. The
//! trait keeps the relay testable against an in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::SessionKey;

/// A finalized piece of transcript, append-only once stored.
///
/// Created only from final recognition events with non-empty trimmed text;
/// partial or interim results never become segments.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptSegment {
    /// Build a segment from recognizer output, trimming surrounding
    /// whitespace. Returns `None` when nothing is left after trimming.
    pub fn from_recognized(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            text: trimmed.to_string(),
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transcript store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only transcript storage, keyed by clinician and appointment.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Append a finalized segment to the appointment's transcript and stamp
    /// the appointment's last recording activity time.
    async fn append(
        &self,
        key: &SessionKey,
        segment: Arc<TranscriptSegment>,
    ) -> Result<(), StoreError>;

    /// All stored segments for the appointment, in append order.
    async fn list_all(&self, key: &SessionKey) -> Result<Vec<Arc<TranscriptSegment>>, StoreError>;
}
