//! LLM-backed observer
//!
//! Inspects the recent ledger, asks the provider for a routing decision plus
//! a mission evaluation, and folds both into one verdict. The observer
//! contract is strict: evaluation never fails. Every internal error path
//! collapses to [`ObserverVerdict::safe_default`], which hands the floor
//! back to nobody and lets the game continue.

use crate::agents::{ContinuationDecision, MissionEvaluation, Observer, ObserverVerdict};
use crate::providers::{extract_json, ChatMessage, Provider};
use crate::state::ConversationState;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// How many trailing messages are shown to the evaluation prompt
const CONTEXT_WINDOW: usize = 5;

/// Observer that evaluates the conversation through a [`Provider`]
pub struct LlmObserver {
    actor_names: Vec<String>,
    player_mission: String,
    provider: Arc<dyn Provider>,
}

impl LlmObserver {
    /// Creates an observer for a session's actor roster and player mission
    pub fn new(actor_names: Vec<String>, player_mission: String, provider: Arc<dyn Provider>) -> Self {
        Self {
            actor_names,
            player_mission,
            provider,
        }
    }

    fn recent_transcript(state: &ConversationState) -> String {
        let start = state.messages.len().saturating_sub(CONTEXT_WINDOW);
        state.messages[start..]
            .iter()
            .map(|m| format!("[{}] {}", m.author, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are an expert observer analyzing a role-play conversation. Decide whether \
             someone must respond before the next turn, and whether the player has achieved \
             their mission.\n\n\
             The characters in the scene are: {}.\n\
             The player's mission: {}\n\n\
             Respond ONLY with a JSON object in this exact format:\n\
             {{\n\
               \"needs_response\": true/false,\n\
               \"who_should_respond\": \"user\", \"character\", a character name, or \"none\",\n\
               \"reason\": \"brief explanation\",\n\
               \"player_mission_achieved\": true/false,\n\
               \"reasoning\": \"brief mission assessment\"\n\
             }}\n\n\
             Rules:\n\
             - If the last message is a question, the other participant should respond\n\
             - If the conversation is complete or naturally paused, use \"none\"\n\
             - After a character's message the user usually responds, and vice versa\n\
             - Only suggest continuing when something is genuinely pending\n\
             - Set player_mission_achieved true only when the transcript clearly shows it",
            self.actor_names.join(", "),
            self.player_mission
        )
    }

    fn parse_verdict(&self, text: &str, turn: u32) -> Option<ObserverVerdict> {
        let value = extract_json(text)?;
        let needs_response = value.get("needs_response")?.as_bool().unwrap_or(false);
        let who = value
            .get("who_should_respond")
            .and_then(|v| v.as_str())
            .unwrap_or("none");
        // Normalize: keep known routing targets and exact actor names,
        // anything else becomes "none".
        let who = if who == "user" || who == "character" || self.actor_names.iter().any(|n| n == who)
        {
            who.to_string()
        } else {
            "none".to_string()
        };
        let reason = value
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("no reason given")
            .to_string();
        let mission_achieved = value
            .get("player_mission_achieved")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let reasoning = value
            .get("reasoning")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Some(ObserverVerdict {
            continuation_decision: ContinuationDecision {
                needs_response,
                who_should_respond: who,
                reason,
            },
            mission_evaluation: Some(MissionEvaluation {
                player_mission_achieved: mission_achieved,
                reasoning,
                ..MissionEvaluation::default()
            }),
            game_ended: mission_achieved,
            game_ended_reason: if mission_achieved {
                "mission_achieved".to_string()
            } else {
                String::new()
            },
            analysis: Some(json!({"turn": turn, "raw_decision": value})),
        })
    }
}

#[async_trait]
impl Observer for LlmObserver {
    async fn evaluate(&self, state: &ConversationState) -> ObserverVerdict {
        if state.messages.is_empty() {
            return ObserverVerdict::safe_default("no messages in the conversation");
        }
        if state.user_exit() {
            return ObserverVerdict::safe_default("the player has requested to exit");
        }

        let last = &state.messages[state.messages.len() - 1];
        let user_prompt = format!(
            "Analyze this conversation:\n\n{}\n\nLast message: [{}] {}\n\n\
             Should anyone respond before the next turn, and has the player achieved \
             their mission? Respond with the specified JSON.",
            Self::recent_transcript(state),
            last.author,
            last.content
        );
        let messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(user_prompt),
        ];

        match self.provider.complete(&messages).await {
            Ok(text) => match self.parse_verdict(&text, state.turn) {
                Some(verdict) => {
                    debug!(
                        "observer verdict: needs_response={}, who={}, game_ended={}",
                        verdict.continuation_decision.needs_response,
                        verdict.continuation_decision.who_should_respond,
                        verdict.game_ended
                    );
                    verdict
                }
                None => {
                    warn!("observer returned unparseable verdict, using safe default");
                    ObserverVerdict::safe_default("evaluation returned unparseable output")
                }
            },
            Err(e) => {
                warn!("observer evaluation failed: {e:#}");
                ObserverVerdict::safe_default(format!("evaluation error: {e:#}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AgoraError, Result};
    use crate::manager::ConversationManager;
    use crate::state::PLAYER_AUTHOR;

    struct CannedProvider {
        reply: Result<String>,
    }

    impl CannedProvider {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(AgoraError::Provider("down".to_string()).into()),
            })
        }
    }

    #[async_trait]
    impl Provider for CannedProvider {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{e:#}")),
            }
        }
    }

    fn observer(provider: Arc<dyn Provider>) -> LlmObserver {
        LlmObserver::new(
            vec!["Livia".to_string()],
            "Convince Livia to open the vault.".to_string(),
            provider,
        )
    }

    #[tokio::test]
    async fn test_empty_ledger_gets_safe_default() {
        let observer = observer(CannedProvider::failing());
        let verdict = observer.evaluate(&ConversationState::default()).await;
        assert!(!verdict.continuation_decision.needs_response);
        assert_eq!(verdict.continuation_decision.who_should_respond, "none");
    }

    #[tokio::test]
    async fn test_user_exit_short_circuits() {
        let observer = observer(CannedProvider::failing());
        let mut manager = ConversationManager::new();
        manager.add_message(PLAYER_AUTHOR, "bye", false);
        manager.set_metadata("user_exit", json!(true));

        let verdict = observer.evaluate(manager.state()).await;
        assert!(!verdict.continuation_decision.needs_response);
    }

    #[tokio::test]
    async fn test_parses_full_verdict() {
        let reply = r#"{"needs_response": true, "who_should_respond": "Livia",
            "reason": "the player asked her a question",
            "player_mission_achieved": false, "reasoning": "vault still closed"}"#;
        let observer = observer(CannedProvider::ok(reply));
        let mut manager = ConversationManager::new();
        manager.add_message(PLAYER_AUTHOR, "Livia, will you open it?", false);

        let verdict = observer.evaluate(manager.state()).await;
        assert!(verdict.continuation_decision.needs_response);
        assert_eq!(verdict.continuation_decision.who_should_respond, "Livia");
        assert!(!verdict.game_ended);
        let eval = verdict.mission_evaluation.expect("evaluation");
        assert!(!eval.player_mission_achieved);
        assert_eq!(eval.reasoning, "vault still closed");
    }

    #[tokio::test]
    async fn test_mission_achieved_ends_game() {
        let reply = r#"{"needs_response": false, "who_should_respond": "none",
            "reason": "done", "player_mission_achieved": true, "reasoning": "vault is open"}"#;
        let observer = observer(CannedProvider::ok(reply));
        let mut manager = ConversationManager::new();
        manager.add_message("Livia", "Fine. It's open.", false);

        let verdict = observer.evaluate(manager.state()).await;
        assert!(verdict.game_ended);
        assert_eq!(verdict.game_ended_reason, "mission_achieved");
    }

    #[tokio::test]
    async fn test_unknown_speaker_normalized_to_none() {
        let reply = r#"{"needs_response": true, "who_should_respond": "Zorblax",
            "reason": "?", "player_mission_achieved": false, "reasoning": ""}"#;
        let observer = observer(CannedProvider::ok(reply));
        let mut manager = ConversationManager::new();
        manager.add_message(PLAYER_AUTHOR, "hello?", false);

        let verdict = observer.evaluate(manager.state()).await;
        assert_eq!(verdict.continuation_decision.who_should_respond, "none");
    }

    #[tokio::test]
    async fn test_provider_failure_gets_safe_default() {
        let observer = observer(CannedProvider::failing());
        let mut manager = ConversationManager::new();
        manager.add_message(PLAYER_AUTHOR, "anyone there?", false);

        let verdict = observer.evaluate(manager.state()).await;
        assert!(!verdict.continuation_decision.needs_response);
        assert!(!verdict.game_ended);
    }

    #[tokio::test]
    async fn test_prose_wrapped_json_still_parses() {
        let reply = "Here is my analysis:\n```json\n{\"needs_response\": true, \
            \"who_should_respond\": \"character\", \"reason\": \"open question\", \
            \"player_mission_achieved\": false, \"reasoning\": \"early\"}\n```";
        let observer = observer(CannedProvider::ok(reply));
        let mut manager = ConversationManager::new();
        manager.add_message(PLAYER_AUTHOR, "what now?", false);

        let verdict = observer.evaluate(manager.state()).await;
        assert!(verdict.continuation_decision.needs_response);
        assert_eq!(verdict.continuation_decision.who_should_respond, "character");
    }
}
