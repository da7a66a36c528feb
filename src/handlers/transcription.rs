//! Audio ingestion and live transcript streaming
//!
//! Two halves of the relay's HTTP surface:
//! - `upload_audio_chunk` accepts one raw audio fragment per request and
//!   hands it to the session manager (fire-and-forget).
//! - `stream_transcriptions` attaches a viewer over Server-Sent Events,
//!   replays stored history, then pushes live segments until disconnect.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use bytes::Bytes;
use futures::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::Auth;
use crate::core::relay::store::TranscriptSegment;
use crate::core::relay::{SessionKey, TranscriptBroadcaster};
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Accept one audio fragment for an appointment's transcription session.
///
/// Rejects empty payloads with 400; otherwise returns 202 as soon as the
/// fragment is handed off. Success does not mean the fragment reached the
/// recognizer or will produce a transcript.
pub async fn upload_audio_chunk(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Path(appointment_id): Path<String>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let key = SessionKey::new(auth.user_id_or_anonymous(), appointment_id);
    debug!(session = %key, size = body.len(), "received audio fragment");

    state.sessions.submit_audio(&key, body)?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "queued": true }))))
}

/// Stored transcript segments for an appointment, in append order.
pub async fn list_transcriptions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Path(appointment_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let key = SessionKey::new(auth.user_id_or_anonymous(), appointment_id);
    let segments = state
        .store
        .list_all(&key)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let segments: Vec<TranscriptSegment> = segments.iter().map(|s| (**s).clone()).collect();
    Ok(Json(segments))
}

/// Deregisters a viewer when its SSE connection goes away.
struct ViewerGuard {
    broadcaster: Arc<TranscriptBroadcaster>,
    key: SessionKey,
    id: Uuid,
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(&self.key, self.id);
    }
}

fn chunk_event(segment: &TranscriptSegment) -> Event {
    Event::default().data(json!({ "type": "chunk", "chunk": segment }).to_string())
}

/// Attach a live transcript viewer over Server-Sent Events.
///
/// The viewer is registered for live segments *before* history is read, so
/// a segment persisted during attach can never be missed - it may instead
/// be delivered twice (once live, once via replay). That at-least-once
/// window is accepted; clients render segments idempotently.
pub async fn stream_transcriptions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Path(appointment_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let key = SessionKey::new(auth.user_id_or_anonymous(), appointment_id);

    let subscription = state.broadcaster.subscribe(&key);
    let guard = ViewerGuard {
        broadcaster: state.broadcaster.clone(),
        key: key.clone(),
        id: subscription.id,
    };
    let mut receiver = subscription.receiver;

    let history = match state.store.list_all(&key).await {
        Ok(history) => history,
        Err(e) => {
            error!(session = %key, error = %e, "failed to read transcript history for replay");
            Vec::new()
        }
    };

    debug!(session = %key, replay = history.len(), "viewer attached");

    let stream = async_stream::stream! {
        let _guard = guard;

        for segment in &history {
            yield Ok(chunk_event(segment));
        }
        while let Some(segment) = receiver.recv().await {
            yield Ok(chunk_event(&segment));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
