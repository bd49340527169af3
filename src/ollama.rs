//! Chat model clients.
//!
//! - **[`OllamaChat`]** calls Ollama's `POST /api/chat` with `stream: false`.
//! - **[`DisabledModel`]** fails every call; used when
//!   `model.provider = "disabled"` so that retrieval-only commands still work.
//!
//! Context turns have no Ollama role of their own and are sent as
//! `assistant` messages, ahead of the user turn they support.
//!
//! # Retry strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Network errors, including a response body cut short → retry
//! - Other 4xx → fail immediately
//!
//! Retries back off exponentially (1s, 2s, 4s, ...) up to
//! `model.max_retries` extra attempts. The final failure becomes
//! [`RagError::ModelFailure`] carrying the server's own message.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ragchat_core::model::ChatModel;
use ragchat_core::models::{Role, Turn};
use ragchat_core::RagError;

use crate::config::ModelConfig;

/// Build the chat model selected by `[model].provider`.
pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "ollama" => Ok(Arc::new(OllamaChat::new(config)?)),
        other => bail!(
            "Unknown model provider: '{}'. Must be disabled or ollama.",
            other
        ),
    }
}

/// A model that refuses every request.
pub struct DisabledModel;

#[async_trait]
impl ChatModel for DisabledModel {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _turns: &[Turn]) -> ragchat_core::Result<String> {
        Err(RagError::ModelFailure(
            "no chat model configured (model.provider = \"disabled\")".to_string(),
        ))
    }
}

pub struct OllamaChat {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    name: String,
    max_retries: u32,
    backoff: Duration,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaChat {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("model.model required for Ollama provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", config.base_url.trim_end_matches('/')),
            name: format!("ollama:{}", model),
            model,
            max_retries: config.max_retries,
            backoff: Duration::from_secs(1),
        })
    }

    /// Override the base retry delay.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant | Role::Context => "assistant",
    }
}

fn wire_messages(turns: &[Turn]) -> Vec<WireMessage<'_>> {
    turns
        .iter()
        .map(|t| WireMessage {
            role: wire_role(t.role),
            content: &t.content,
        })
        .collect()
}

/// Pull the server's message out of an error body, falling back to the raw
/// text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ChatResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, turns: &[Turn]) -> ragchat_core::Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: wire_messages(turns),
            stream: false,
        };

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1x, 2x, 4x, ...
                let delay = self.backoff * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            debug!(model = %self.model, attempt, turns = turns.len(), "POST /api/chat");
            let resp = self.client.post(&self.endpoint).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    let text = match response.text().await {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(attempt, %status, error = %e, "failed to read model response");
                            last_err = Some(format!("Ollama response body unreadable: {}", e));
                            continue;
                        }
                    };

                    if status.is_success() {
                        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                            RagError::ModelFailure(format!("invalid Ollama response: {}", e))
                        })?;
                        if let Some(err) = parsed.error {
                            return Err(RagError::ModelFailure(err));
                        }
                        return parsed.message.map(|m| m.content).ok_or_else(|| {
                            RagError::ModelFailure("Ollama response has no message".to_string())
                        });
                    }

                    let message = format!("Ollama API error {}: {}", status, error_message(&text));

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(attempt, %status, "retryable model error");
                        last_err = Some(message);
                        continue;
                    }

                    return Err(RagError::ModelFailure(message));
                }
                Err(e) => {
                    warn!(attempt, error = %e, "model request failed");
                    last_err = Some(format!("Ollama request failed: {}", e));
                    continue;
                }
            }
        }

        Err(RagError::ModelFailure(last_err.unwrap_or_else(|| {
            "chat request failed after retries".to_string()
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn http_reply(status: u16, body: &str, content_length: usize) -> String {
        format!(
            "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status, content_length, body
        )
    }

    /// Serve one canned HTTP response per connection, in order.
    async fn mock_server(responses: Vec<(u16, &'static str)>) -> String {
        mock_raw(
            responses
                .into_iter()
                .map(|(status, body)| http_reply(status, body, body.len()))
                .collect(),
        )
        .await
    }

    /// Serve raw response bytes, one per connection, in order.
    async fn mock_raw(replies: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for reply in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        format!("http://{}", addr)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn config(base_url: String, max_retries: u32) -> ModelConfig {
        ModelConfig {
            provider: "ollama".to_string(),
            base_url,
            model: Some("llama3.2".to_string()),
            timeout_secs: 5,
            max_retries,
        }
    }

    #[test]
    fn context_turns_are_sent_as_assistant() {
        let turns = vec![
            Turn::system("be brief"),
            Turn::context("Question: Q\nAnswer: A\n"),
            Turn::user("Q"),
        ];
        let roles: Vec<&str> = wire_messages(&turns).iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "assistant", "user"]);
    }

    #[test]
    fn error_message_prefers_server_field() {
        assert_eq!(
            error_message(r#"{"error":"model 'nope' not found"}"#),
            "model 'nope' not found"
        );
        assert_eq!(error_message("plain failure\n"), "plain failure");
    }

    #[tokio::test]
    async fn disabled_model_always_fails() {
        let err = DisabledModel.complete(&[Turn::user("hi")]).await.unwrap_err();
        assert!(matches!(err, RagError::ModelFailure(_)));
    }

    #[tokio::test]
    async fn returns_message_content() {
        let url = mock_server(vec![(
            200,
            r#"{"model":"llama3.2","message":{"role":"assistant","content":"Yes, it is free."},"done":true}"#,
        )])
        .await;
        let model = OllamaChat::new(&config(url, 0)).unwrap();
        let reply = model.complete(&[Turn::user("Is GitHub free?")]).await.unwrap();
        assert_eq!(reply, "Yes, it is free.");
        assert_eq!(model.name(), "ollama:llama3.2");
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let url = mock_server(vec![
            (503, r#"{"error":"loading model"}"#),
            (200, r#"{"message":{"role":"assistant","content":"ok"}}"#),
        ])
        .await;
        let model = OllamaChat::new(&config(url, 2))
            .unwrap()
            .with_backoff(Duration::from_millis(10));
        assert_eq!(model.complete(&[Turn::user("hi")]).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let url = mock_server(vec![(404, r#"{"error":"model 'llama3.2' not found"}"#)]).await;
        let model = OllamaChat::new(&config(url, 3))
            .unwrap()
            .with_backoff(Duration::from_millis(10));
        let err = model.complete(&[Turn::user("hi")]).await.unwrap_err();
        match err {
            RagError::ModelFailure(msg) => assert!(msg.contains("not found"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut cfg = config("http://localhost:11434".to_string(), 0);
        cfg.provider = "gpt".to_string();
        assert!(create_model(&cfg).is_err());
    }

    #[tokio::test]
    async fn truncated_body_is_retried() {
        let partial = r#"{"message":{"role":"assistant","#;
        let full = r#"{"message":{"role":"assistant","content":"ok"}}"#;
        let url = mock_raw(vec![
            http_reply(200, partial, partial.len() + 64),
            http_reply(200, full, full.len()),
        ])
        .await;
        let model = OllamaChat::new(&config(url, 1))
            .unwrap()
            .with_backoff(Duration::from_millis(10));
        assert_eq!(model.complete(&[Turn::user("hi")]).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn truncated_body_reports_transport_error() {
        let partial = r#"{"message":{"role":"assistant","#;
        let url = mock_raw(vec![http_reply(200, partial, partial.len() + 64)]).await;
        let model = OllamaChat::new(&config(url, 0)).unwrap();
        match model.complete(&[Turn::user("hi")]).await.unwrap_err() {
            RagError::ModelFailure(msg) => {
                assert!(msg.starts_with("Ollama response body unreadable"), "{}", msg);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
