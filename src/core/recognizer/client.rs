//! Recognizer WebSocket connection
//!
//! Thin typed wrapper around one `tokio-tungstenite` connection. After the
//! handshake the socket splits into a send half ([`RecognizerSink`]) and a
//! receive half ([`RecognizerEvents`]) so the session task can forward
//! audio and pull events concurrently.
//!
//! Inbound frames that are not usable transcription results - metadata,
//! provider errors, unknown or malformed JSON - are logged and skipped, not
//! treated as failures. Only transport-level problems surface as errors,
//! which terminate the session.

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::config::RecognizerConfig;
use super::messages::{KeepAliveMessage, RecognizerMessage, SettingsMessage, StreamCloseMessage};

/// How long to wait for the WebSocket handshake before giving up. There is
/// one attempt per session; a timeout closes the session and the next audio
/// fragment starts a fresh one.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors from the recognizer connection.
///
/// None of these propagate to the audio-submitting caller; they end the
/// affected session only.
#[derive(Debug, thiserror::Error)]
pub enum RecognizerError {
    #[error("recognizer connection failed: {0}")]
    ConnectionFailed(String),

    #[error("recognizer network error: {0}")]
    NetworkError(String),

    #[error("recognizer configuration error: {0}")]
    ConfigurationError(String),
}

/// A transcription event pulled off the socket.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerEvent {
    pub text: String,
    /// Stable result, as opposed to an interim guess a later event revises.
    pub is_final: bool,
}

/// One live connection to the external recognizer.
pub struct RecognizerSocket {
    inner: WsStream,
}

/// Send half: configuration, keep-alives, and audio.
pub struct RecognizerSink {
    sink: SplitSink<WsStream, Message>,
}

/// Receive half: inbound recognition events.
pub struct RecognizerEvents {
    stream: SplitStream<WsStream>,
}

impl RecognizerSocket {
    /// Open the connection and complete the WebSocket handshake.
    pub async fn connect(config: &RecognizerConfig) -> Result<Self, RecognizerError> {
        let ws_url = config.build_websocket_url();
        let host = config.host().ok_or_else(|| {
            RecognizerError::ConfigurationError(format!("invalid recognizer URL: {}", config.url))
        })?;

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(&ws_url)
            .header("Host", host)
            .header("Upgrade", "websocket")
            .header("Connection", "upgrade")
            .header("Sec-WebSocket-Key", generate_key())
            .header("Sec-WebSocket-Version", "13")
            .header("Authorization", format!("Token {}", config.api_key))
            .body(())
            .map_err(|e| {
                RecognizerError::ConnectionFailed(format!("failed to build request: {e}"))
            })?;

        let (ws_stream, _response) = timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| {
                RecognizerError::ConnectionFailed(format!(
                    "handshake timed out after {}s",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| RecognizerError::ConnectionFailed(e.to_string()))?;

        info!(url = %config.url, model = %config.model, "recognizer stream open");

        Ok(Self { inner: ws_stream })
    }

    /// Split into independent send and receive halves.
    pub fn into_parts(self) -> (RecognizerSink, RecognizerEvents) {
        let (sink, stream) = self.inner.split();
        (RecognizerSink { sink }, RecognizerEvents { stream })
    }
}

impl RecognizerSink {
    /// Send the one-time configuration message describing the audio format.
    pub async fn send_settings(
        &mut self,
        config: &RecognizerConfig,
    ) -> Result<(), RecognizerError> {
        let settings = SettingsMessage::new(
            config.model.clone(),
            config.encoding.clone(),
            config.sample_rate,
            config.channels,
            config.smart_format,
        );
        self.send_json(&settings).await
    }

    pub async fn send_keep_alive(&mut self) -> Result<(), RecognizerError> {
        self.send_json(&KeepAliveMessage::default()).await
    }

    /// Forward one raw audio fragment as a binary frame.
    pub async fn send_audio(&mut self, fragment: Bytes) -> Result<(), RecognizerError> {
        let len = fragment.len();
        self.sink
            .send(Message::Binary(fragment))
            .await
            .map_err(|e| RecognizerError::NetworkError(format!("failed to send audio: {e}")))?;
        debug!("sent {len} bytes of audio to recognizer");
        Ok(())
    }

    /// Best-effort graceful shutdown: ask the recognizer to flush, then
    /// close the transport.
    pub async fn close_stream(&mut self) {
        if self.send_json(&StreamCloseMessage::default()).await.is_ok() {
            let _ = self.sink.send(Message::Close(None)).await;
        }
    }

    async fn send_json<T: serde::Serialize>(&mut self, value: &T) -> Result<(), RecognizerError> {
        let json = serde_json::to_string(value)
            .map_err(|e| RecognizerError::ConfigurationError(e.to_string()))?;
        self.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RecognizerError::NetworkError(e.to_string()))
    }
}

impl RecognizerEvents {
    /// Pull the next transcription event off the socket.
    ///
    /// Skips frames the relay does not act on. Returns `None` when the
    /// recognizer closed the connection, `Some(Err(_))` on transport
    /// failure. Cancel-safe: at most one frame is consumed per call.
    pub async fn next_event(&mut self) -> Option<Result<RecognizerEvent, RecognizerError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => match RecognizerMessage::parse(&text) {
                    Ok(RecognizerMessage::Results(results)) => {
                        let Some(transcript) = results.transcript() else {
                            debug!("results frame without alternatives, ignoring");
                            continue;
                        };
                        return Some(Ok(RecognizerEvent {
                            text: transcript.to_string(),
                            is_final: results.is_final,
                        }));
                    }
                    Ok(RecognizerMessage::Metadata(meta)) => {
                        debug!(request_id = ?meta.request_id, "recognizer session metadata");
                    }
                    Ok(RecognizerMessage::Unknown(raw)) => {
                        debug!("ignoring recognizer frame: {raw}");
                    }
                    Err(e) => {
                        warn!("unparsable recognizer frame ignored: {e}");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    info!("recognizer stream closed: {frame:?}");
                    return None;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Binary(_))) => {
                    debug!("unexpected binary frame from recognizer, ignoring");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Some(Err(RecognizerError::NetworkError(e.to_string())));
                }
                None => {
                    info!("recognizer stream ended");
                    return None;
                }
            }
        }
    }
}
