//! Session-scoped fan-out of transcript segments to live viewers
//!
//! Each viewer is a bounded mpsc channel feeding one SSE connection. A push
//! is a single `try_send`: it never blocks the session's event loop, and a
//! failure (viewer buffer full or connection gone) evicts only that viewer.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::SessionKey;
use super::store::TranscriptSegment;

/// Per-viewer buffer. A viewer that falls this many segments behind is
/// treated as stalled and evicted (at-most-once delivery).
const VIEWER_BUFFER_CAPACITY: usize = 64;

struct Viewer {
    id: Uuid,
    sender: mpsc::Sender<Arc<TranscriptSegment>>,
}

/// A live viewer registration handed to the SSE connection.
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<Arc<TranscriptSegment>>,
}

/// Maps a session key to its dynamic set of live viewer connections.
///
/// Constructed per `AppState`, never process-global, so tests build fresh
/// isolated instances.
#[derive(Default)]
pub struct TranscriptBroadcaster {
    viewers: DashMap<SessionKey, Vec<Viewer>>,
}

impl TranscriptBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new viewer under `key`.
    pub fn subscribe(&self, key: &SessionKey) -> Subscription {
        let (sender, receiver) = mpsc::channel(VIEWER_BUFFER_CAPACITY);
        let id = Uuid::new_v4();

        self.viewers
            .entry(key.clone())
            .or_default()
            .push(Viewer { id, sender });

        debug!(session = %key, viewer = %id, "viewer subscribed");
        Subscription { id, receiver }
    }

    /// Remove a viewer. Dropping the last viewer of a session removes the
    /// session's entry entirely so empty sets never accumulate.
    pub fn unsubscribe(&self, key: &SessionKey, id: Uuid) {
        if let Some(mut entry) = self.viewers.get_mut(key) {
            entry.retain(|viewer| viewer.id != id);
        }
        self.viewers.remove_if(key, |_, viewers| viewers.is_empty());
        debug!(session = %key, viewer = %id, "viewer unsubscribed");
    }

    /// Deliver a segment to every viewer of `key`.
    ///
    /// Each push is an independent bounded attempt; a failed push evicts
    /// that viewer without affecting the rest. Returns the number of
    /// viewers the segment was delivered to.
    pub fn publish(&self, key: &SessionKey, segment: &Arc<TranscriptSegment>) -> usize {
        let delivered = match self.viewers.get_mut(key) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|viewer| viewer.sender.try_send(segment.clone()).is_ok());
                let after = entry.len();
                if after < before {
                    debug!(
                        session = %key,
                        evicted = before - after,
                        "evicted stalled or disconnected viewers"
                    );
                }
                after
            }
            None => return 0,
        };

        self.viewers.remove_if(key, |_, viewers| viewers.is_empty());
        delivered
    }

    /// Number of live viewers for a session.
    pub fn viewer_count(&self, key: &SessionKey) -> usize {
        self.viewers.get(key).map(|v| v.len()).unwrap_or(0)
    }

    /// Number of sessions with at least one viewer.
    pub fn session_count(&self) -> usize {
        self.viewers.len()
    }
}
