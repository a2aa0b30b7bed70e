//! Scripted test doubles for actors and the observer
//!
//! These are deterministic stand-ins used by the test suites and by demo
//! runs without a provider. The scripted observer's default "alternating"
//! policy hands the floor to a character after every player message and
//! back to the player otherwise, which makes single player turns produce
//! exactly one NPC reply.

use crate::agents::{Actor, AgentFactory, ContinuationDecision, Observer, ObserverVerdict};
use crate::error::{AgoraError, Result};
use crate::scenario::ActorSpec;
use crate::state::{ConversationState, Message, PLAYER_AUTHOR};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Actor that replays a fixed list of lines
pub struct ScriptedActor {
    name: String,
    lines: Mutex<VecDeque<String>>,
    fallback: String,
    fail: bool,
}

impl ScriptedActor {
    /// Creates an actor that speaks `lines` in order, then repeats a stock
    /// line once the script runs out
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lines: Mutex::new(lines.into()),
            fallback: "...".to_string(),
            fail: false,
        }
    }

    /// Creates an actor whose every response fails
    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: Mutex::new(VecDeque::new()),
            fallback: String::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl Actor for ScriptedActor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, _history: &[Message]) -> Result<String> {
        if self.fail {
            return Err(AgoraError::Agent(format!("{} is scripted to fail", self.name)).into());
        }
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        Ok(lines.pop_front().unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Observer double with an optional queue of canned verdicts
///
/// Queued verdicts are consumed first; once empty, the configured default
/// policy takes over.
pub struct ScriptedObserver {
    queued: Mutex<VecDeque<ObserverVerdict>>,
    default: DefaultPolicy,
}

enum DefaultPolicy {
    /// Character replies after player messages, player otherwise
    Alternating,
    /// A fixed verdict
    Fixed(ObserverVerdict),
}

impl ScriptedObserver {
    /// Observer with the alternating policy and no queued verdicts
    pub fn alternating() -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default: DefaultPolicy::Alternating,
        }
    }

    /// Observer that consumes `verdicts` in order, then alternates
    pub fn with_verdicts(verdicts: Vec<ObserverVerdict>) -> Self {
        Self {
            queued: Mutex::new(verdicts.into()),
            default: DefaultPolicy::Alternating,
        }
    }

    /// Observer that always returns a clone of `verdict`
    pub fn with_default(verdict: ObserverVerdict) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default: DefaultPolicy::Fixed(verdict),
        }
    }

    fn alternating_verdict(state: &ConversationState) -> ObserverVerdict {
        let player_spoke_last = state
            .messages
            .last()
            .is_some_and(|m| m.author == PLAYER_AUTHOR);
        if player_spoke_last {
            ObserverVerdict {
                continuation_decision: ContinuationDecision {
                    needs_response: true,
                    who_should_respond: "character".to_string(),
                    reason: "the player addressed the scene".to_string(),
                },
                ..ObserverVerdict::default()
            }
        } else {
            ObserverVerdict::safe_default("waiting for the player")
        }
    }
}

#[async_trait]
impl Observer for ScriptedObserver {
    async fn evaluate(&self, state: &ConversationState) -> ObserverVerdict {
        let queued = {
            let mut queue = self.queued.lock().unwrap_or_else(|e| e.into_inner());
            queue.pop_front()
        };
        if let Some(verdict) = queued {
            return verdict;
        }
        match &self.default {
            DefaultPolicy::Alternating => Self::alternating_verdict(state),
            DefaultPolicy::Fixed(verdict) => verdict.clone(),
        }
    }
}

/// [`AgentFactory`] producing scripted doubles
///
/// Each actor speaks lines derived from its spec name; the observer uses the
/// alternating policy.
#[derive(Default)]
pub struct ScriptedFactory;

impl ScriptedFactory {
    /// Creates the factory
    pub fn new() -> Self {
        Self
    }
}

impl AgentFactory for ScriptedFactory {
    fn build_actor(&self, spec: &ActorSpec) -> Arc<dyn Actor> {
        let name = spec.name.trim().to_string();
        let lines = vec![
            format!("{name} considers your words carefully."),
            format!("{name} nods slowly."),
        ];
        Arc::new(ScriptedActor::new(name, lines))
    }

    fn build_observer(&self, _actor_names: &[String], _player_mission: &str) -> Arc<dyn Observer> {
        Arc::new(ScriptedObserver::alternating())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ConversationManager;

    #[tokio::test]
    async fn test_scripted_actor_replays_then_falls_back() {
        let actor = ScriptedActor::new("Livia", vec!["one".into(), "two".into()]);
        assert_eq!(actor.respond(&[]).await.expect("line"), "one");
        assert_eq!(actor.respond(&[]).await.expect("line"), "two");
        assert_eq!(actor.respond(&[]).await.expect("line"), "...");
    }

    #[tokio::test]
    async fn test_failing_actor_errors() {
        let actor = ScriptedActor::failing("Glitch");
        assert!(actor.respond(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_alternating_observer_follows_last_author() {
        let observer = ScriptedObserver::alternating();
        let mut manager = ConversationManager::new();

        manager.add_message("Livia", "hello", false);
        let verdict = observer.evaluate(manager.state()).await;
        assert!(!verdict.continuation_decision.needs_response);

        manager.add_message(PLAYER_AUTHOR, "hi", false);
        let verdict = observer.evaluate(manager.state()).await;
        assert!(verdict.continuation_decision.needs_response);
        assert_eq!(verdict.continuation_decision.who_should_respond, "character");
    }

    #[tokio::test]
    async fn test_queued_verdicts_consumed_first() {
        let observer = ScriptedObserver::with_verdicts(vec![ObserverVerdict {
            game_ended: true,
            game_ended_reason: "scripted end".to_string(),
            ..ObserverVerdict::default()
        }]);
        let manager = ConversationManager::new();

        let first = observer.evaluate(manager.state()).await;
        assert!(first.game_ended);

        let second = observer.evaluate(manager.state()).await;
        assert!(!second.game_ended);
    }

    #[test]
    fn test_factory_builds_from_spec() {
        let factory = ScriptedFactory::new();
        let actor = factory.build_actor(&ActorSpec {
            name: "  Maren ".to_string(),
            ..Default::default()
        });
        assert_eq!(actor.name(), "Maren");
    }
}
