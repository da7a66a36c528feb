//! Clinical note drafting endpoint
//!
//! Streams generated note deltas to the requesting client as SSE frames.
//! Unlike the transcription relay there is exactly one producer and one
//! consumer per request; nothing here is persisted or fanned out.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::auth::Auth;
use crate::core::notes::DraftRequest;
use crate::core::relay::SessionKey;
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DraftNoteBody {
    /// Extra clinician-supplied prompts to honor in the draft.
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Draft a treatment note from the appointment's transcript, streaming
/// content deltas as SSE `{"type":"delta","text":...}` frames followed by
/// a terminal `{"type":"done"}` (or `{"type":"error"}`) frame.
pub async fn generate_note_draft(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<Auth>,
    Path(appointment_id): Path<String>,
    Json(body): Json<DraftNoteBody>,
) -> AppResult<impl IntoResponse> {
    let Some(drafts) = state.drafts.clone() else {
        return Err(AppError::UpstreamUnavailable(
            "text generation is not configured".to_string(),
        ));
    };

    let key = SessionKey::new(auth.user_id_or_anonymous(), appointment_id);
    let segments = state
        .store
        .list_all(&key)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let transcript_text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let request = DraftRequest {
        transcript_text,
        instructions: body.instructions,
    };

    info!(session = %key, segments = segments.len(), "drafting note from transcript");

    let (delta_tx, mut delta_rx) = mpsc::channel(64);
    let producer = tokio::spawn(async move { drafts.stream_draft(&request, delta_tx).await });

    let stream = async_stream::stream! {
        while let Some(delta) = delta_rx.recv().await {
            yield Ok::<_, std::convert::Infallible>(
                Event::default().data(json!({ "type": "delta", "text": delta }).to_string()),
            );
        }

        match producer.await {
            Ok(Ok(_content)) => {
                yield Ok(Event::default().data(json!({ "type": "done" }).to_string()));
            }
            Ok(Err(e)) => {
                warn!("note draft stream failed: {e}");
                yield Ok(Event::default().data(
                    json!({ "type": "error", "message": "Failed to generate note" }).to_string(),
                ));
            }
            Err(e) => {
                error!("note draft task panicked: {e}");
                yield Ok(Event::default().data(
                    json!({ "type": "error", "message": "Failed to generate note" }).to_string(),
                ));
            }
        }
    };

    Ok(Sse::new(stream))
}
