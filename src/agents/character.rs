//! LLM-backed NPC actor
//!
//! Builds a persona system prompt from the actor's spec, renders the visible
//! history as an attributed transcript, and asks the provider for the next
//! line. The persona's private mission stays in the system prompt; it is
//! never surfaced to the player.

use crate::agents::Actor;
use crate::error::Result;
use crate::providers::{ChatMessage, Provider};
use crate::scenario::ActorSpec;
use crate::state::Message;
use crate::stream::DeltaSink;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// NPC actor that generates responses through a [`Provider`]
pub struct LlmActor {
    spec: ActorSpec,
    provider: Arc<dyn Provider>,
}

impl LlmActor {
    /// Creates an actor from its scenario spec
    pub fn new(spec: ActorSpec, provider: Arc<dyn Provider>) -> Self {
        Self { spec, provider }
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {}, a character in a group role-play conversation.\n\
             Your personality: {}\n\n\
             Respond naturally and consistently with your personality.\n\
             Keep your responses concise (typically 1-3 sentences).\n\
             Reply only with the message content, without prefixes or explanations.",
            self.spec.name, self.spec.personality
        );
        if let Some(background) = &self.spec.background {
            prompt.push_str(&format!(
                "\n\nYour background: {background}\nStay consistent with it."
            ));
        }
        if let Some(mission) = &self.spec.mission {
            prompt.push_str(&format!(
                "\n\nYou have a secret mission to pursue during the conversation. \
                 Never reveal it explicitly.\nYour mission: {mission}"
            ));
        }
        prompt
    }

    fn build_messages(&self, history: &[Message]) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.system_prompt())];
        for message in history {
            messages.push(ChatMessage::user(format!(
                "[{}] {}",
                message.author, message.content
            )));
        }
        messages
    }
}

#[async_trait]
impl Actor for LlmActor {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn respond(&self, history: &[Message]) -> Result<String> {
        debug!("{} responding to {} messages", self.spec.name, history.len());
        let text = self.provider.complete(&self.build_messages(history)).await?;
        Ok(text.trim().to_string())
    }

    async fn respond_streaming(&self, history: &[Message], sink: &DeltaSink) -> Result<String> {
        debug!(
            "{} responding (streaming) to {} messages",
            self.spec.name,
            history.len()
        );
        let text = self
            .provider
            .complete_streaming(&self.build_messages(history), sink)
            .await?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgoraError;
    use std::sync::Mutex;

    struct CapturingProvider {
        captured: Mutex<Vec<ChatMessage>>,
        reply: String,
    }

    impl CapturingProvider {
        fn new(reply: &str) -> Self {
            Self {
                captured: Mutex::new(Vec::new()),
                reply: reply.to_string(),
            }
        }
    }

    #[async_trait]
    impl Provider for CapturingProvider {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            *self.captured.lock().unwrap() = messages.to_vec();
            Ok(self.reply.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Err(AgoraError::Provider("unreachable".to_string()).into())
        }
    }

    fn spec() -> ActorSpec {
        ActorSpec {
            name: "Livia".to_string(),
            personality: "Sharp-tongued merchant.".to_string(),
            mission: Some("Sell the cursed amulet.".to_string()),
            background: Some("Grew up on the docks.".to_string()),
            scene_presence: None,
        }
    }

    #[tokio::test]
    async fn test_system_prompt_includes_persona() {
        let provider = Arc::new(CapturingProvider::new("Deal."));
        let actor = LlmActor::new(spec(), provider.clone());

        actor.respond(&[]).await.expect("respond");

        let captured = provider.captured.lock().unwrap();
        let system = &captured[0];
        assert_eq!(system.role, "system");
        assert!(system.content.contains("You are Livia"));
        assert!(system.content.contains("Sharp-tongued merchant."));
        assert!(system.content.contains("Grew up on the docks."));
        assert!(system.content.contains("Sell the cursed amulet."));
    }

    #[tokio::test]
    async fn test_history_rendered_as_attributed_transcript() {
        let provider = Arc::new(CapturingProvider::new("Indeed."));
        let actor = LlmActor::new(spec(), provider.clone());
        let history = vec![Message {
            author: "Player".to_string(),
            content: "How much for the amulet?".to_string(),
            timestamp: chrono::Utc::now(),
            turn: 1,
            displayed: false,
        }];

        actor.respond(&history).await.expect("respond");

        let captured = provider.captured.lock().unwrap();
        assert_eq!(captured[1].content, "[Player] How much for the amulet?");
    }

    #[tokio::test]
    async fn test_response_is_trimmed() {
        let provider = Arc::new(CapturingProvider::new("  Ten silver.  \n"));
        let actor = LlmActor::new(spec(), provider);
        assert_eq!(actor.respond(&[]).await.expect("respond"), "Ten silver.");
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let actor = LlmActor::new(spec(), Arc::new(FailingProvider));
        assert!(actor.respond(&[]).await.is_err());
    }
}
