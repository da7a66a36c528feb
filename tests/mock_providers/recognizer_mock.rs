//! WebSocket mock server for the speech recognizer
//!
//! Simulates the Deepgram streaming endpoint: accepts connections, records
//! every frame the relay sends (settings, keep-alives, binary audio), and
//! lets tests script `Results` events per connection.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// One live mock connection's outbound control channel.
struct Connection {
    event_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

enum ConnectionCommand {
    SendText(String),
    Close,
}

#[derive(Default)]
pub struct MockRecognizerState {
    /// Binary audio frames in arrival order, across all connections.
    pub audio_frames: Mutex<Vec<Vec<u8>>>,
    /// Text frames (settings, keep-alives) in arrival order.
    pub text_frames: Mutex<Vec<String>>,
    connections: Mutex<Vec<Connection>>,
    connection_count: AtomicU64,
}

pub struct MockRecognizer {
    pub url: String,
    state: Arc<MockRecognizerState>,
    _accept_task: tokio::task::JoinHandle<()>,
}

impl MockRecognizer {
    pub async fn start() -> Self {
        Self::start_with_handshake_delay(Duration::ZERO).await
    }

    /// Start a mock whose WebSocket handshake is delayed, keeping the
    /// relay's socket in its connecting state for `delay`.
    pub async fn start_with_handshake_delay(delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockRecognizerState::default());

        let accept_state = state.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    if delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = handle_connection(stream, state).await;
                });
            }
        });

        Self {
            url: format!("ws://{addr}/"),
            state,
            _accept_task: accept_task,
        }
    }

    /// Emit a `Results` event on connection `index` (in accept order).
    pub async fn emit_results(&self, index: usize, transcript: &str, is_final: bool) {
        let frame = json!({
            "type": "Results",
            "is_final": is_final,
            "channel": {
                "alternatives": [
                    { "transcript": transcript, "confidence": 0.95 }
                ]
            }
        });
        self.emit_raw(index, &frame.to_string()).await;
    }

    /// Emit an arbitrary text frame on connection `index`.
    pub async fn emit_raw(&self, index: usize, frame: &str) {
        let connections = self.state.connections.lock().await;
        if let Some(connection) = connections.get(index) {
            let _ = connection
                .event_tx
                .send(ConnectionCommand::SendText(frame.to_string()));
        }
    }

    /// Close connection `index` from the server side.
    pub async fn close_connection(&self, index: usize) {
        let connections = self.state.connections.lock().await;
        if let Some(connection) = connections.get(index) {
            let _ = connection.event_tx.send(ConnectionCommand::Close);
        }
    }

    pub fn connection_count(&self) -> u64 {
        self.state.connection_count.load(Ordering::SeqCst)
    }

    pub async fn audio_frames(&self) -> Vec<Vec<u8>> {
        self.state.audio_frames.lock().await.clone()
    }

    pub async fn text_frames(&self) -> Vec<String> {
        self.state.text_frames.lock().await.clone()
    }

    /// Poll until `count` connections have been accepted.
    pub async fn wait_for_connections(&self, count: u64, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.connection_count() < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count} mock recognizer connections"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until at least `count` audio frames have arrived.
    pub async fn wait_for_audio_frames(&self, count: usize, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.state.audio_frames.lock().await.len() < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count} audio frames"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockRecognizerState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    {
        let mut connections = state.connections.lock().await;
        connections.push(Connection { event_tx });
    }
    state.connection_count.fetch_add(1, Ordering::SeqCst);

    // Send initial metadata the way the real endpoint does
    let metadata = json!({
        "type": "Metadata",
        "request_id": format!("req-{}", state.connection_count.load(Ordering::SeqCst)),
    });
    write.send(Message::Text(metadata.to_string().into())).await?;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Binary(audio))) => {
                    state.audio_frames.lock().await.push(audio.to_vec());
                }
                Some(Ok(Message::Text(text))) => {
                    let is_close_stream = serde_json::from_str::<serde_json::Value>(&text)
                        .ok()
                        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(String::from))
                        .is_some_and(|t| t == "CloseStream");
                    state.text_frames.lock().await.push(text.to_string());
                    if is_close_stream {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    write.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                _ => {}
            },
            command = event_rx.recv() => match command {
                Some(ConnectionCommand::SendText(frame)) => {
                    write.send(Message::Text(frame.into())).await?;
                }
                Some(ConnectionCommand::Close) => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                None => break,
            },
        }
    }

    Ok(())
}
