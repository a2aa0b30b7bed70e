//! Agent abstractions: actors, the observer, and their decision types
//!
//! Actors and the observer are the two collaborators the step executor talks
//! to. Both are small traits so the engine works identically against
//! LLM-backed implementations and scripted test doubles.

pub mod character;
pub mod observer;
pub mod scripted;

use crate::error::Result;
use crate::scenario::ActorSpec;
use crate::state::{ConversationState, Message};
use crate::stream::DeltaSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use character::LlmActor;
pub use observer::LlmObserver;
pub use scripted::{ScriptedActor, ScriptedFactory, ScriptedObserver};

/// The observer's verdict on who should speak next
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationDecision {
    /// Whether anyone should respond before the next turn
    #[serde(default)]
    pub needs_response: bool,
    /// `"user"`, `"character"`, a concrete actor name, or `"none"`
    #[serde(default = "default_who")]
    pub who_should_respond: String,
    /// Short explanation of the decision
    #[serde(default)]
    pub reason: String,
}

fn default_who() -> String {
    "none".to_string()
}

impl Default for ContinuationDecision {
    fn default() -> Self {
        Self {
            needs_response: false,
            who_should_respond: default_who(),
            reason: String::new(),
        }
    }
}

/// Evaluation of the player's mission progress
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionEvaluation {
    /// Whether the player has achieved the scenario's win condition
    #[serde(default)]
    pub player_mission_achieved: bool,
    /// Reasoning behind the evaluation
    #[serde(default)]
    pub reasoning: String,
    /// Per-actor flags and any extra fields the observer reports
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Everything the observer reports after inspecting the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObserverVerdict {
    /// Who should speak next
    #[serde(default)]
    pub continuation_decision: ContinuationDecision,
    /// Mission progress, when the observer evaluated it
    #[serde(default)]
    pub mission_evaluation: Option<MissionEvaluation>,
    /// Whether the scenario's end condition has been met
    #[serde(default)]
    pub game_ended: bool,
    /// Reason recorded alongside `game_ended`
    #[serde(default)]
    pub game_ended_reason: String,
    /// Optional free-form analysis snapshot, keyed by turn in metadata
    #[serde(default)]
    pub analysis: Option<Value>,
}

impl ObserverVerdict {
    /// The safe default verdict: nobody needs to respond, game continues
    ///
    /// Observer implementations return this on internal failure so a flaky
    /// evaluation never stalls the turn machine.
    pub fn safe_default(reason: impl Into<String>) -> Self {
        Self {
            continuation_decision: ContinuationDecision {
                needs_response: false,
                who_should_respond: "none".to_string(),
                reason: reason.into(),
            },
            ..Self::default()
        }
    }
}

/// An NPC persona capable of producing a response given the visible history
#[async_trait]
pub trait Actor: Send + Sync {
    /// The actor's name, used as message author and routing target
    fn name(&self) -> &str;

    /// Produces the actor's next message from the visible history
    ///
    /// # Errors
    ///
    /// Failure here is fatal to the session's turn machine (a half-spoken
    /// turn cannot be safely resumed), so implementations should only fail
    /// when the response is genuinely unavailable.
    async fn respond(&self, history: &[Message]) -> Result<String>;

    /// Like [`Actor::respond`], but forwards incremental chunks to `sink`
    ///
    /// The default implementation produces the full response and emits it as
    /// a single chunk. Returns the final concatenated text either way.
    async fn respond_streaming(&self, history: &[Message], sink: &DeltaSink) -> Result<String> {
        let text = self.respond(history).await?;
        sink.send(&text);
        Ok(text)
    }
}

/// The collaborator that decides who should speak next and whether the
/// scenario's win condition has been met
///
/// Contracted to never fail: implementations absorb internal errors and
/// return [`ObserverVerdict::safe_default`].
#[async_trait]
pub trait Observer: Send + Sync {
    /// Inspects the ledger and produces a verdict
    async fn evaluate(&self, state: &ConversationState) -> ObserverVerdict;
}

/// Ordered collection of the actors in a session
///
/// Registration order is stable: the first registered actor is the fallback
/// speaker when the observer names no recognizable actor.
#[derive(Default, Clone)]
pub struct ActorRegistry {
    actors: Vec<Arc<dyn Actor>>,
}

impl ActorRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an actor, keeping insertion order
    pub fn register(&mut self, actor: Arc<dyn Actor>) {
        self.actors.push(actor);
    }

    /// Looks up an actor by exact name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Actor>> {
        self.actors.iter().find(|a| a.name() == name).cloned()
    }

    /// Returns the first registered actor, the default speaker
    pub fn first(&self) -> Option<Arc<dyn Actor>> {
        self.actors.first().cloned()
    }

    /// Actor names in registration order
    pub fn names(&self) -> Vec<String> {
        self.actors.iter().map(|a| a.name().to_string()).collect()
    }

    /// Number of registered actors
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// True when no actors are registered
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl std::fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("actors", &self.names())
            .finish()
    }
}

/// Builds actor and observer handles from scenario specs
///
/// Injected into the engine so session construction and rehydration work
/// the same for LLM-backed agents and scripted doubles.
pub trait AgentFactory: Send + Sync {
    /// Builds one actor from its spec
    fn build_actor(&self, spec: &ActorSpec) -> Arc<dyn Actor>;

    /// Builds the observer for a session
    fn build_observer(&self, actor_names: &[String], player_mission: &str) -> Arc<dyn Observer>;
}

/// [`AgentFactory`] producing LLM-backed actors and observer
pub struct LlmAgentFactory {
    provider: Arc<dyn crate::providers::Provider>,
}

impl LlmAgentFactory {
    /// Creates a factory that backs all agents with the given provider
    pub fn new(provider: Arc<dyn crate::providers::Provider>) -> Self {
        Self { provider }
    }
}

impl AgentFactory for LlmAgentFactory {
    fn build_actor(&self, spec: &ActorSpec) -> Arc<dyn Actor> {
        Arc::new(LlmActor::new(spec.clone(), Arc::clone(&self.provider)))
    }

    fn build_observer(&self, actor_names: &[String], player_mission: &str) -> Arc<dyn Observer> {
        Arc::new(LlmObserver::new(
            actor_names.to_vec(),
            player_mission.to_string(),
            Arc::clone(&self.provider),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_decision_default() {
        let decision = ContinuationDecision::default();
        assert!(!decision.needs_response);
        assert_eq!(decision.who_should_respond, "none");
    }

    #[test]
    fn test_continuation_decision_partial_deserialize() {
        let decision: ContinuationDecision =
            serde_json::from_str(r#"{"needs_response": true}"#).expect("deserialize");
        assert!(decision.needs_response);
        assert_eq!(decision.who_should_respond, "none");
    }

    #[test]
    fn test_verdict_safe_default() {
        let verdict = ObserverVerdict::safe_default("observer failure");
        assert!(!verdict.game_ended);
        assert!(!verdict.continuation_decision.needs_response);
        assert_eq!(verdict.continuation_decision.who_should_respond, "none");
        assert_eq!(verdict.continuation_decision.reason, "observer failure");
    }

    #[test]
    fn test_mission_evaluation_keeps_extra_fields() {
        let eval: MissionEvaluation = serde_json::from_str(
            r#"{"player_mission_achieved": true, "reasoning": "done", "livia_convinced": true}"#,
        )
        .expect("deserialize");
        assert!(eval.player_mission_achieved);
        assert_eq!(eval.extra.get("livia_convinced"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_registry_order_and_lookup() {
        let mut registry = ActorRegistry::new();
        registry.register(Arc::new(ScriptedActor::new("Alice", vec!["hi".into()])));
        registry.register(Arc::new(ScriptedActor::new("Bob", vec!["yo".into()])));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["Alice", "Bob"]);
        assert_eq!(registry.first().map(|a| a.name().to_string()), Some("Alice".into()));
        assert!(registry.get("Bob").is_some());
        assert!(registry.get("Claire").is_none());
    }
}
