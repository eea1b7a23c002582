//! Streaming chat-completion client for the OpenAI API.
//!
//! Sends a `stream: true` completion request and decodes the SSE `data:`
//! frames as they arrive, forwarding each content delta through a channel
//! so the WebSocket layer can relay tokens to the client in real time.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Default completion model.
pub const MODEL_DEFAULT: &str = "gpt-3.5-turbo";
/// Large-context model used when the prompt (usually a fat render log)
/// doesn't fit the default context.
pub const MODEL_LARGE_CONTEXT: &str = "gpt-3.5-turbo-16k-0613";

/// Prompt size above which the large-context model is selected.
pub const LARGE_CONTEXT_THRESHOLD_TOKENS: usize = 4_000;
/// Prompt size above which even the large-context model gives up and the
/// fallback prompt is used instead.
pub const MAX_PROMPT_TOKENS: usize = 16_000;

/// Rough token estimate at ~4 bytes per token. Only used to pick a model
/// tier, so precision doesn't matter much.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Errors from the text-generation layer.
#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    /// The HTTP request failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("OpenAI API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// A streaming text generator.
///
/// Implementations push content deltas into `chunks` as they arrive and
/// return once the stream ends. Dropping the receiving side stops the
/// forwarding silently; generation itself runs to completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        system: &str,
        user: &str,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<(), OpenAiError>;
}

/// OpenAI chat-completions client.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// * `api_key`  - Bearer token for the API.
    /// * `base_url` - API origin, e.g. `https://api.openai.com`
    ///   (overridable for tests and proxies).
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(
        &self,
        model: &str,
        system: &str,
        user: &str,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<(), OpenAiError> {
        let body = json!({
            "model": model,
            "stream": true,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(OpenAiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(part) = stream.next().await {
            let bytes = part?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            // SSE frames are newline-delimited; anything after the last
            // newline is an incomplete frame kept for the next read.
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);

                let Some(payload) = line.strip_prefix("data: ") else {
                    continue;
                };
                if payload == "[DONE]" {
                    return Ok(());
                }
                if let Some(delta) = extract_content_delta(payload) {
                    // Receiver gone means the client disconnected; keep
                    // draining so the request completes cleanly.
                    let _ = chunks.send(delta);
                }
            }
        }

        Ok(())
    }
}

/// Pull the content delta out of one streamed completion frame, if it
/// carries any text (role-only and finish frames don't).
fn extract_content_delta(payload: &str) -> Option<String> {
    let frame: Value = serde_json::from_str(payload).ok()?;
    frame["choices"][0]["delta"]["content"]
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_content_from_stream_frame() {
        let payload = r#"{"choices":[{"delta":{"content":"Hello"},"index":0}]}"#;
        assert_eq!(extract_content_delta(payload), Some("Hello".to_string()));
    }

    #[test]
    fn skips_frames_without_content() {
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#;
        let finish = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(extract_content_delta(role_only), None);
        assert_eq!(extract_content_delta(finish), None);
        assert_eq!(extract_content_delta("not json"), None);
    }

    #[test]
    fn token_estimate_tracks_byte_length() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert!(estimate_tokens(&"x".repeat(20_000)) > MAX_PROMPT_TOKENS.min(5_000));
    }
}
