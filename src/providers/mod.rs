//! Text-completion provider abstraction
//!
//! The engine treats the LLM as an opaque chat-completion service. The
//! [`Provider`] trait is the whole contract; [`DeepSeekProvider`] is the
//! bundled OpenAI-compatible implementation.

pub mod deepseek;

pub use deepseek::DeepSeekProvider;

use crate::error::Result;
use crate::stream::DeltaSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message in a chat-completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the sender (system, user, assistant)
    pub role: String,
    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Creates a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// An opaque text-completion service
#[async_trait]
pub trait Provider: Send + Sync {
    /// Produces a completion for the given messages
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Produces a completion, forwarding incremental chunks to `sink`
    ///
    /// The default implementation completes non-streaming and emits the
    /// whole text as one chunk. Returns the final concatenated text.
    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        sink: &DeltaSink,
    ) -> Result<String> {
        let text = self.complete(messages).await?;
        sink.send(&text);
        Ok(text)
    }
}

/// Extracts the first JSON object embedded in `text`
///
/// LLM responses often wrap JSON in prose or code fences; this finds the
/// outermost `{...}` span and parses it. Returns None when no parseable
/// object is present.
pub fn extract_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
