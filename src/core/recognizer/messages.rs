//! WebSocket message types for the Deepgram streaming API.
//!
//! - **Outgoing messages**: binary audio (sent directly, no JSON wrapper),
//!   plus [`SettingsMessage`] once on open, [`KeepAliveMessage`] on a timer,
//!   and [`StreamCloseMessage`] for graceful shutdown.
//! - **Incoming messages**: [`ResultsMessage`] carrying transcript
//!   alternatives with the `is_final` marker. Everything else (metadata,
//!   errors, unknown types) is ignored by the relay.

use serde::{Deserialize, Serialize};

// =============================================================================
// Outgoing Messages (Client to Server)
// =============================================================================

/// Configuration message sent once after the connection opens, describing
/// the audio the session will forward.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsMessage {
    /// Message type identifier (always "Settings")
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub model: String,
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub smart_format: bool,
}

impl SettingsMessage {
    pub fn new(
        model: impl Into<String>,
        encoding: impl Into<String>,
        sample_rate: u32,
        channels: u16,
        smart_format: bool,
    ) -> Self {
        Self {
            message_type: "Settings",
            model: model.into(),
            encoding: encoding.into(),
            sample_rate,
            channels,
            smart_format,
        }
    }
}

/// Periodic no-op frame that keeps the recognizer from closing an idle
/// connection.
#[derive(Debug, Clone, Serialize)]
pub struct KeepAliveMessage {
    /// Message type identifier (always "KeepAlive")
    #[serde(rename = "type")]
    pub message_type: &'static str,
}

impl Default for KeepAliveMessage {
    fn default() -> Self {
        Self {
            message_type: "KeepAlive",
        }
    }
}

/// Graceful end-of-stream request; the recognizer flushes pending results
/// and closes.
#[derive(Debug, Clone, Serialize)]
pub struct StreamCloseMessage {
    /// Message type identifier (always "CloseStream")
    #[serde(rename = "type")]
    pub message_type: &'static str,
}

impl Default for StreamCloseMessage {
    fn default() -> Self {
        Self {
            message_type: "CloseStream",
        }
    }
}

// =============================================================================
// Incoming Messages (Server to Client)
// =============================================================================

/// A transcription result event.
///
/// `is_final` distinguishes stable results from interim guesses that a
/// later event may revise; only final results become transcript segments.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsMessage {
    /// Message type identifier ("Results")
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub channel: Option<ResultsChannel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsChannel {
    #[serde(default)]
    pub alternatives: Vec<ResultsAlternative>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl ResultsMessage {
    /// Transcript text of the first alternative, if any.
    pub fn transcript(&self) -> Option<&str> {
        self.channel
            .as_ref()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.as_str())
    }
}

/// Connection metadata sent by the recognizer when a session opens.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataMessage {
    /// Message type identifier ("Metadata")
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

// =============================================================================
// Message Enum and Parsing
// =============================================================================

/// Enum for all inbound recognizer messages the relay distinguishes.
#[derive(Debug)]
pub enum RecognizerMessage {
    /// Transcription result (partial or final)
    Results(ResultsMessage),
    /// Connection metadata
    Metadata(MetadataMessage),
    /// Anything else (errors, future message types)
    Unknown(String),
}

impl RecognizerMessage {
    /// Parse a WebSocket text frame into the appropriate type.
    ///
    /// Type matching is case-insensitive; the recognizer has historically
    /// varied the casing of `Results`.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct TypePeek {
            #[serde(rename = "type")]
            message_type: String,
        }

        let peek: TypePeek = serde_json::from_str(text)?;

        match peek.message_type.to_lowercase().as_str() {
            "results" => {
                let msg: ResultsMessage = serde_json::from_str(text)?;
                Ok(RecognizerMessage::Results(msg))
            }
            "metadata" => {
                let msg: MetadataMessage = serde_json::from_str(text)?;
                Ok(RecognizerMessage::Metadata(msg))
            }
            _ => Ok(RecognizerMessage::Unknown(text.to_string())),
        }
    }
}
