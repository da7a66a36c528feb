use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::transcription;
use crate::state::AppState;
use std::sync::Arc;

/// Create the transcription relay router
///
/// The audio route gets its own body limit: fragments are small, and the
/// cap bounds what a misbehaving client can buffer server-side. The SSE
/// attach route is long-lived and accepts `?token=` credentials because
/// EventSource cannot set headers.
pub fn create_transcription_router(max_fragment_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/appointments/{id}/transcription/audio",
            post(transcription::upload_audio_chunk).layer(DefaultBodyLimit::max(max_fragment_bytes)),
        )
        .route(
            "/appointments/{id}/transcription/stream",
            get(transcription::stream_transcriptions),
        )
        .layer(TraceLayer::new_for_http())
}
