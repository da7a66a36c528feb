//! Clinical note drafting
//!
//! Sends the consult transcript to an OpenAI-compatible chat-completions
//! endpoint and streams the generated draft back to the requesting client.
//! Strictly simpler concurrency than the transcription relay: one producer,
//! one consumer, no persistent queueing.

mod client;

pub use client::{DraftClient, DraftError};

/// Input for a note draft.
pub struct DraftRequest {
    /// The consult transcript, segments joined in order.
    pub transcript_text: String,
    /// Extra clinician-supplied prompts to honor.
    pub instructions: Option<String>,
}

pub(crate) const SYSTEM_PROMPT: &str = "You are a clinical documentation assistant. \
Draft a concise, professionally worded treatment note from the consultation \
transcript provided. Use plain prose under clear headings. Only include \
information supported by the transcript; never invent findings.";

pub(crate) fn build_user_prompt(request: &DraftRequest) -> String {
    let mut prompt = String::from("CONSULTATION TRANSCRIPT:\n");
    if request.transcript_text.is_empty() {
        prompt.push_str("(no transcript recorded)\n");
    } else {
        prompt.push_str(&request.transcript_text);
        prompt.push('\n');
    }
    if let Some(instructions) = request
        .instructions
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        prompt.push_str("\nADDITIONAL INSTRUCTIONS:\n");
        prompt.push_str(instructions);
        prompt.push('\n');
    }
    prompt
}
