pub mod notes;
pub mod recognizer;
pub mod relay;

// Re-export commonly used types for convenience
pub use recognizer::{
    RecognizerConfig, RecognizerError, RecognizerEvent, RecognizerMessage, RecognizerSocket,
};

pub use relay::{
    OverflowPolicy, PendingAudioQueue, PendingAudioSettings, SessionKey, SessionManager,
    StoreError, Subscription, TranscriptBroadcaster, TranscriptSegment, TranscriptStore,
    memory_store::MemoryTranscriptStore,
};

pub use notes::{DraftClient, DraftError, DraftRequest};
