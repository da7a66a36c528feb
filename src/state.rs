//! Shared application state

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::config::ServerConfig;
use crate::core::notes::DraftClient;
use crate::core::relay::memory_store::MemoryTranscriptStore;
use crate::core::relay::{SessionManager, TranscriptBroadcaster, TranscriptStore};

/// Application state shared across all request handlers.
///
/// The relay registries (session manager, broadcaster) are owned here and
/// constructed per instance - never as process-wide globals - so tests can
/// build fresh, isolated states.
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn TranscriptStore>,
    pub broadcaster: Arc<TranscriptBroadcaster>,
    pub sessions: Arc<SessionManager>,
    /// `None` when no text-generation API key is configured; note drafting
    /// responds 503 in that case.
    pub drafts: Option<Arc<DraftClient>>,
    /// `None` when no JWT secret is configured; requests are then admitted
    /// anonymously (auth_required must be false, enforced at config load).
    pub token_verifier: Option<TokenVerifier>,
}

impl AppState {
    /// Build state with the default in-memory transcript store.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Self::with_store(config, Arc::new(MemoryTranscriptStore::new()))
    }

    /// Build state over a caller-provided transcript store.
    pub fn with_store(config: ServerConfig, store: Arc<dyn TranscriptStore>) -> Arc<Self> {
        let broadcaster = Arc::new(TranscriptBroadcaster::new());
        let sessions = Arc::new(SessionManager::new(
            config.recognizer_config(),
            config.pending_audio_settings(),
            store.clone(),
            broadcaster.clone(),
        ));
        let drafts = config.openai_api_key.as_ref().map(|key| {
            Arc::new(DraftClient::new(
                config.openai_api_url.clone(),
                key.clone(),
                config.openai_model.clone(),
            ))
        });
        let token_verifier = config.auth_jwt_secret.as_deref().map(TokenVerifier::new);

        Arc::new(Self {
            config,
            store,
            broadcaster,
            sessions,
            drafts,
            token_verifier,
        })
    }
}
