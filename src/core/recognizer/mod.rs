//! Upstream speech-recognizer WebSocket client (Deepgram streaming API)
//!
//! One outbound full-duplex connection per live transcription session:
//! a configuration handshake on open, periodic keep-alives against the
//! service's inactivity timeout, raw binary audio out, and JSON `Results`
//! events in. The session task in [`crate::core::relay::session`] owns the
//! socket's lifecycle; this module owns the wire protocol.

mod client;
mod config;
mod messages;

pub use client::{
    RecognizerError, RecognizerEvent, RecognizerEvents, RecognizerSink, RecognizerSocket,
};
pub use config::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE, RecognizerConfig};
pub use messages::{
    KeepAliveMessage, MetadataMessage, RecognizerMessage, ResultsAlternative, ResultsChannel,
    ResultsMessage, SettingsMessage, StreamCloseMessage,
};
