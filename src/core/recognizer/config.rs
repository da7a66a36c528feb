//! Recognizer connection settings
//!
//! Model and audio-format parameters are fixed at session creation; they
//! are deployment configuration, not runtime-negotiated.

use std::time::Duration;

/// Minimum supported sample rate (8kHz for telephony)
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// Maximum supported sample rate (48kHz for high-quality audio)
pub const MAX_SAMPLE_RATE: u32 = 48000;

/// Settings for one recognizer WebSocket connection.
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// API key sent as `Authorization: Token <key>`.
    pub api_key: String,
    /// WebSocket endpoint, e.g. `wss://api.deepgram.com/v1/listen`.
    pub url: String,
    /// Recognition model, e.g. `nova-2-general`.
    pub model: String,
    /// Audio encoding the browser captures in, e.g. `opus`.
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Ask the recognizer to punctuate and format numbers/dates.
    pub smart_format: bool,
    /// Interval between KeepAlive frames.
    pub keep_alive_interval: Duration,
}

impl RecognizerConfig {
    /// Full connection URL with model parameters in the query string.
    pub fn build_websocket_url(&self) -> String {
        format!(
            "{}?model={}&smart_format={}",
            self.url, self.model, self.smart_format
        )
    }

    /// Host portion of the endpoint, for the WebSocket handshake headers.
    pub fn host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }
}
