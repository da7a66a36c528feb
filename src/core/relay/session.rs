//! Session registry and recognizer socket lifecycle
//!
//! One point of truth mapping a [`SessionKey`] to its live recognizer
//! connection. Each session is a spawned task that owns the socket and a
//! pending-audio queue; HTTP handlers hand fragments over a bounded channel
//! and never wait on upstream network I/O.
//!
//! Socket lifecycle is `Connecting -> Ready -> Closed`, one attempt per
//! instance. There is no automatic reconnect: when a session closes, its
//! mapping is removed and the next audio fragment lazily creates a fresh
//! session.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::recognizer::{RecognizerConfig, RecognizerEvent, RecognizerSocket};
use crate::core::relay::broadcast::TranscriptBroadcaster;
use crate::core::relay::store::{TranscriptSegment, TranscriptStore};
use crate::core::relay::SessionKey;
use crate::errors::app_error::AppError;

/// What to do with a fragment that arrives while the pending-audio queue
/// is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest buffered fragment to make room (bias to fresh audio).
    DropOldest,
    /// Drop the incoming fragment and keep what is buffered.
    RejectNew,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop-oldest" | "drop_oldest" => Ok(OverflowPolicy::DropOldest),
            "reject-new" | "reject_new" => Ok(OverflowPolicy::RejectNew),
            _ => Err(format!(
                "Unsupported overflow policy: {s}. Supported policies: drop-oldest, reject-new"
            )),
        }
    }
}

/// Buffering settings for audio awaiting a connecting recognizer socket.
#[derive(Debug, Clone, Copy)]
pub struct PendingAudioSettings {
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for PendingAudioSettings {
    fn default() -> Self {
        Self {
            capacity: 256,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

/// Outcome of offering a fragment to the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Stored,
    /// Stored, but the oldest buffered fragment was evicted.
    DroppedOldest,
    /// The fragment itself was dropped.
    Rejected,
}

/// Ordered audio fragments awaiting a socket that is still connecting.
///
/// Owned exclusively by the session task; drained strictly in arrival
/// order once the socket is ready, then left empty.
pub struct PendingAudioQueue {
    items: VecDeque<Bytes>,
    settings: PendingAudioSettings,
    dropped: u64,
}

impl PendingAudioQueue {
    pub fn new(settings: PendingAudioSettings) -> Self {
        Self {
            items: VecDeque::new(),
            settings,
            dropped: 0,
        }
    }

    pub fn push(&mut self, fragment: Bytes) -> PushOutcome {
        if self.items.len() < self.settings.capacity {
            self.items.push_back(fragment);
            return PushOutcome::Stored;
        }
        match self.settings.overflow {
            OverflowPolicy::DropOldest => {
                self.items.pop_front();
                self.items.push_back(fragment);
                self.dropped += 1;
                PushOutcome::DroppedOldest
            }
            OverflowPolicy::RejectNew => {
                self.dropped += 1;
                PushOutcome::Rejected
            }
        }
    }

    pub fn pop_front(&mut self) -> Option<Bytes> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Fragments lost to the overflow policy over this queue's lifetime.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

struct SessionHandle {
    id: Uuid,
    audio_tx: mpsc::Sender<Bytes>,
}

/// Registry of live transcription sessions.
///
/// Constructed per `AppState`, never process-global. When no recognizer
/// API key is configured the manager runs in a disabled mode: audio
/// submissions succeed but fragments are dropped with a warning, so a
/// misconfigured deployment degrades instead of failing the browser.
pub struct SessionManager {
    sessions: Arc<DashMap<SessionKey, SessionHandle>>,
    recognizer: Option<RecognizerConfig>,
    pending_audio: PendingAudioSettings,
    store: Arc<dyn TranscriptStore>,
    broadcaster: Arc<TranscriptBroadcaster>,
}

impl SessionManager {
    pub fn new(
        recognizer: Option<RecognizerConfig>,
        pending_audio: PendingAudioSettings,
        store: Arc<dyn TranscriptStore>,
        broadcaster: Arc<TranscriptBroadcaster>,
    ) -> Self {
        if recognizer.is_none() {
            warn!("recognizer API key is not configured; transcription is disabled");
        }
        Self {
            sessions: Arc::new(DashMap::new()),
            recognizer,
            pending_audio,
            store,
            broadcaster,
        }
    }

    /// Accept one audio fragment for a session.
    ///
    /// Creates the session (and opens the upstream connection) on first
    /// fragment. Returns as soon as the fragment is handed to the session
    /// task - success does not mean the fragment reached the recognizer.
    pub fn submit_audio(&self, key: &SessionKey, fragment: Bytes) -> Result<(), AppError> {
        if fragment.is_empty() {
            return Err(AppError::EmptyPayload);
        }

        let Some(config) = &self.recognizer else {
            warn!(session = %key, "transcription disabled, dropping audio fragment");
            return Ok(());
        };

        // A session that terminated between lookup and send is replaced
        // once; a second closed channel means the registry is churning
        // faster than we can hand off, so give up on this fragment.
        for _ in 0..2 {
            let audio_tx = self
                .sessions
                .entry(key.clone())
                .or_insert_with(|| self.spawn_session(key, config))
                .audio_tx
                .clone();

            match audio_tx.try_send(fragment.clone()) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(_)) => {
                    warn!(session = %key, "session backlog full, dropping audio fragment");
                    return Ok(());
                }
                Err(TrySendError::Closed(_)) => {
                    self.sessions
                        .remove_if(key, |_, handle| handle.audio_tx.is_closed());
                }
            }
        }

        warn!(session = %key, "session closed twice during hand-off, dropping audio fragment");
        Ok(())
    }

    fn spawn_session(&self, key: &SessionKey, config: &RecognizerConfig) -> SessionHandle {
        let id = Uuid::new_v4();
        // The hand-off channel is only a thin buffer between the HTTP
        // handler and the session task; the pending queue applies the
        // real capacity and overflow policy.
        let (audio_tx, audio_rx) = mpsc::channel(self.pending_audio.capacity.max(32));

        info!(session = %key, "opening transcription session");

        let task = SessionTask {
            id,
            key: key.clone(),
            config: config.clone(),
            pending: PendingAudioQueue::new(self.pending_audio),
            store: self.store.clone(),
            broadcaster: self.broadcaster.clone(),
            sessions: Arc::clone(&self.sessions),
        };
        tokio::spawn(task.run(audio_rx));

        SessionHandle { id, audio_tx }
    }

    /// Whether a live session exists for `key`.
    pub fn has_session(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// The per-session actor owning the recognizer socket.
struct SessionTask {
    id: Uuid,
    key: SessionKey,
    config: RecognizerConfig,
    pending: PendingAudioQueue,
    store: Arc<dyn TranscriptStore>,
    broadcaster: Arc<TranscriptBroadcaster>,
    sessions: Arc<DashMap<SessionKey, SessionHandle>>,
}

impl SessionTask {
    async fn run(mut self, mut audio_rx: mpsc::Receiver<Bytes>) {
        if let Some(socket) = self.connect(&mut audio_rx).await {
            self.ready_loop(socket, audio_rx).await;
        }
        self.teardown();
    }

    /// Connecting state: buffer arriving fragments until the handshake
    /// completes. Returns `None` when the connection fails (buffered audio
    /// is dropped, no transcript will be produced).
    async fn connect(&mut self, audio_rx: &mut mpsc::Receiver<Bytes>) -> Option<RecognizerSocket> {
        let config = self.config.clone();
        let connect = RecognizerSocket::connect(&config);
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => match result {
                    Ok(socket) => return Some(socket),
                    Err(e) => {
                        warn!(
                            session = %self.key,
                            error = %e,
                            buffered = self.pending.len(),
                            "recognizer connection failed, dropping buffered audio"
                        );
                        return None;
                    }
                },
                fragment = audio_rx.recv() => match fragment {
                    Some(fragment) => self.buffer(fragment),
                    // Registry entry was removed; nobody will send again.
                    None => return None,
                },
            }
        }
    }

    fn buffer(&mut self, fragment: Bytes) {
        match self.pending.push(fragment) {
            PushOutcome::Stored => {}
            PushOutcome::DroppedOldest => {
                warn!(session = %self.key, "pending audio queue full, evicted oldest fragment");
            }
            PushOutcome::Rejected => {
                warn!(session = %self.key, "pending audio queue full, rejected fragment");
            }
        }
    }

    /// Ready state: configuration handshake, queue drain, then the main
    /// event loop until the socket closes or errors.
    async fn ready_loop(&mut self, socket: RecognizerSocket, mut audio_rx: mpsc::Receiver<Bytes>) {
        let (mut sink, mut events) = socket.into_parts();

        if let Err(e) = sink.send_settings(&self.config).await {
            warn!(session = %self.key, error = %e, "failed to send recognizer settings");
            return;
        }

        let buffered = self.pending.len();
        while let Some(fragment) = self.pending.pop_front() {
            if let Err(e) = sink.send_audio(fragment).await {
                warn!(session = %self.key, error = %e, "failed to flush buffered audio");
                return;
            }
        }
        if buffered > 0 {
            debug!(session = %self.key, count = buffered, "flushed buffered audio fragments");
        }

        // First tick is one interval away so a fresh connection is not
        // immediately pinged.
        let mut keep_alive = interval_at(
            Instant::now() + self.config.keep_alive_interval,
            self.config.keep_alive_interval,
        );

        loop {
            tokio::select! {
                event = events.next_event() => match event {
                    Some(Ok(event)) => self.handle_transcript(event).await,
                    Some(Err(e)) => {
                        warn!(session = %self.key, error = %e, "recognizer transport error");
                        return;
                    }
                    None => return,
                },
                fragment = audio_rx.recv() => match fragment {
                    Some(fragment) => {
                        if let Err(e) = sink.send_audio(fragment).await {
                            warn!(session = %self.key, error = %e, "failed to forward audio");
                            return;
                        }
                    }
                    None => {
                        sink.close_stream().await;
                        return;
                    }
                },
                _ = keep_alive.tick() => {
                    if let Err(e) = sink.send_keep_alive().await {
                        warn!(session = %self.key, error = %e, "failed to send keep-alive");
                        return;
                    }
                }
            }
        }
    }

    /// Persist-then-broadcast for final results; interim guesses and empty
    /// transcripts are discarded.
    async fn handle_transcript(&self, event: RecognizerEvent) {
        if !event.is_final {
            return;
        }
        let Some(segment) = TranscriptSegment::from_recognized(&event.text) else {
            return;
        };
        let segment = Arc::new(segment);

        // Persistence happens-before broadcast: a viewer that attaches
        // concurrently and replays history never misses a segment it could
        // have seen live. An append failure is logged and the segment is
        // still broadcast; it may be absent from later replays.
        if let Err(e) = self.store.append(&self.key, segment.clone()).await {
            error!(session = %self.key, error = %e, "failed to persist transcript segment");
        }

        let delivered = self.broadcaster.publish(&self.key, &segment);
        debug!(session = %self.key, viewers = delivered, "transcript segment broadcast");
    }

    /// Remove this session's registry entry, unless a successor has
    /// already replaced it.
    fn teardown(&self) {
        self.sessions
            .remove_if(&self.key, |_, handle| handle.id == self.id);
        info!(session = %self.key, "transcription session closed");
    }
}
