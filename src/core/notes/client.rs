//! Streaming client for an OpenAI-compatible chat-completions endpoint.

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use super::{DraftRequest, SYSTEM_PROMPT, build_user_prompt};

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("text generation request failed: {0}")]
    RequestFailed(String),

    #[error("text generation returned status {0}")]
    BadStatus(u16),

    #[error("text generation stream error: {0}")]
    StreamError(String),
}

/// One parsed server-sent line from the completions stream.
#[derive(Debug, PartialEq)]
enum StreamLine {
    Delta(String),
    Done,
    Skip,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

fn parse_stream_line(line: &str) -> StreamLine {
    let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
        return StreamLine::Skip;
    };
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => match chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|content| !content.is_empty())
        {
            Some(content) => StreamLine::Delta(content),
            None => StreamLine::Skip,
        },
        Err(e) => {
            debug!("skipping unparsable completions line: {e}");
            StreamLine::Skip
        }
    }
}

/// Client for the note-drafting text-generation endpoint.
pub struct DraftClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl DraftClient {
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            model,
        }
    }

    /// Draft a note, forwarding each content delta to `delta_tx` in arrival
    /// order. Returns the fully assembled draft when the stream ends.
    ///
    /// A dropped receiver (client navigated away) stops the stream without
    /// error - the partial content assembled so far is returned.
    pub async fn stream_draft(
        &self,
        request: &DraftRequest,
        delta_tx: mpsc::Sender<String>,
    ) -> Result<String, DraftError> {
        let body = json!({
            "model": self.model,
            "temperature": 0.2,
            "stream": true,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_user_prompt(request) },
            ],
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DraftError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DraftError::BadStatus(response.status().as_u16()));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut content = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DraftError::StreamError(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Frames are newline-delimited; anything after the last newline
            // is an incomplete line kept for the next chunk.
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').to_string();
                buffer.drain(..=pos);

                match parse_stream_line(&line) {
                    StreamLine::Delta(delta) => {
                        content.push_str(&delta);
                        if delta_tx.send(delta).await.is_err() {
                            return Ok(content);
                        }
                    }
                    StreamLine::Done => return Ok(content),
                    StreamLine::Skip => {}
                }
            }
        }

        Ok(content)
    }
}
