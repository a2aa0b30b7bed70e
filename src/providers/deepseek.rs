//! DeepSeek provider implementation
//!
//! Connects to the DeepSeek chat-completions API (OpenAI-compatible wire
//! format) to generate completions, with optional SSE streaming. The API
//! base is configurable so tests can point the provider at a mock server.

use crate::config::ProviderConfig;
use crate::error::{AgoraError, Result};
use crate::providers::{ChatMessage, Provider};
use crate::stream::DeltaSink;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Request timeout for completion calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// DeepSeek chat-completions provider
pub struct DeepSeekProvider {
    client: Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// One parsed server-sent event line
#[derive(Debug, PartialEq)]
enum SseLine {
    /// A content delta
    Content(String),
    /// The `[DONE]` sentinel
    Done,
    /// Comment, empty line, or a chunk without content
    Skip,
}

/// Parses one SSE line from the completion stream
fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .first()
            .and_then(|c| c.delta.content.clone())
            .map(SseLine::Content)
            .unwrap_or(SseLine::Skip),
        Err(_) => SseLine::Skip,
    }
}

impl DeepSeekProvider {
    /// Creates a provider from configuration
    ///
    /// The API key is read from the environment variable named by
    /// `config.api_key_env`; when absent, requests are sent without
    /// authentication (useful against local mocks).
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(AgoraError::Http)?;
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            stream,
        };
        let mut builder = self.client.post(self.completions_url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(AgoraError::Http)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgoraError::Provider(format!(
                "completion request failed with {status}: {body}"
            ))
            .into());
        }
        Ok(response)
    }
}

#[async_trait]
impl Provider for DeepSeekProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("completion request: {} messages", messages.len());
        let response = self.send(messages, false).await?;
        let parsed: CompletionResponse = response.json().await.map_err(AgoraError::Http)?;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| AgoraError::Provider("completion returned no content".to_string()))?;
        Ok(content)
    }

    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        sink: &DeltaSink,
    ) -> Result<String> {
        debug!("streaming completion request: {} messages", messages.len());
        let response = self.send(messages, true).await?;
        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut full_text = String::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk: Bytes = chunk.map_err(AgoraError::Http)?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                match parse_sse_line(&line) {
                    SseLine::Content(delta) => {
                        full_text.push_str(&delta);
                        sink.send(delta);
                    }
                    SseLine::Done => return Ok(full_text),
                    SseLine::Skip => {}
                }
            }
        }
        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_line_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Content("Hel".to_string()));
    }

    #[test]
    fn test_parse_sse_line_done() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
    }

    #[test]
    fn test_parse_sse_line_skips_empty_and_comments() {
        assert_eq!(parse_sse_line(""), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
    }

    #[test]
    fn test_parse_sse_line_skips_role_only_chunk() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Skip);
    }

    #[test]
    fn test_parse_sse_line_skips_malformed_json() {
        assert_eq!(parse_sse_line("data: {broken"), SseLine::Skip);
    }

    #[test]
    fn test_provider_builds_completions_url() {
        let config = ProviderConfig {
            api_base: "http://localhost:9999/v1/".to_string(),
            model: "deepseek-chat".to_string(),
            api_key_env: "AGORA_TEST_UNSET_KEY".to_string(),
        };
        let provider = DeepSeekProvider::new(&config).expect("provider");
        assert_eq!(
            provider.completions_url(),
            "http://localhost:9999/v1/chat/completions"
        );
    }
}
