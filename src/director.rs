//! Turn director: routing decisions and the single-step executor
//!
//! The routing functions are pure and deterministic; [`run_one_step`]
//! advances the turn machine by exactly one phase (a character speaks, or
//! the player speaks), consults the observer, and reports where the machine
//! goes next. The caller composes phases into loops.

use crate::agents::{ActorRegistry, ContinuationDecision, Observer};
use crate::manager::ConversationManager;
use crate::state::{ConversationState, Message, PLAYER_AUTHOR};
use crate::stream::DeltaSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Phase of the turn machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    /// A character should speak next
    Character,
    /// The player should speak next
    UserInput,
    /// Terminal state; the session makes no further progress
    Ended,
}

impl NextAction {
    /// Lossy parse from a persisted value
    ///
    /// Anything unrecognized defaults to [`NextAction::UserInput`]: on a
    /// corrupt snapshot, hand control back to a human rather than guess at
    /// automation.
    pub fn parse_lossy(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("character") => Self::Character,
            Some("ended") => Self::Ended,
            _ => Self::UserInput,
        }
    }
}

/// Whether the game loop may continue into another character turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Keep going
    Continue,
    /// Turn limit reached or the player exited
    End,
}

/// One event produced while advancing the turn machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A complete message was appended to the ledger
    Message {
        author: String,
        content: String,
        timestamp: DateTime<Utc>,
        turn: u32,
    },
    /// An incremental text chunk from a streaming character response
    MessageDelta { delta: String },
    /// A fatal step failure
    Error { message: String },
    /// The scenario ended (win condition, exit, or fatal failure)
    GameEnded {
        reason: String,
        mission_evaluation: Option<Value>,
    },
}

/// Result of one executed phase
#[derive(Debug)]
pub struct StepOutcome {
    /// Where the machine goes next
    pub next_action: NextAction,
    /// Whether the game is over (observer verdict, exit, or fatal failure)
    pub game_ended: bool,
    /// Events produced by this phase, in order
    pub events: Vec<GameEvent>,
}

/// Decides the next phase from the observer's continuation decision
///
/// Fail-open to the player: an unrecognized `who_should_respond` name routes
/// to `UserInput` rather than silently stalling.
pub fn route_continuation(decision: &ContinuationDecision, actor_names: &[String]) -> NextAction {
    if !decision.needs_response {
        return NextAction::UserInput;
    }
    let who = decision.who_should_respond.as_str();
    if who == "user" {
        return NextAction::UserInput;
    }
    if who == "character" || actor_names.iter().any(|n| n == who) {
        return NextAction::Character;
    }
    NextAction::UserInput
}

/// Decides whether the loop may continue into another character turn
pub fn route_should_continue(state: &ConversationState, max_turns: u32) -> Continuation {
    if state.user_exit() {
        return Continuation::End;
    }
    if state.turn >= max_turns {
        return Continuation::End;
    }
    Continuation::Continue
}

/// Counts trailing messages not authored by the player
///
/// Stops at the first player message or the start of history. Used to force
/// a player turn after a configurable non-player streak.
pub fn messages_since_user(messages: &[Message]) -> usize {
    messages
        .iter()
        .rev()
        .take_while(|m| m.author != PLAYER_AUTHOR)
        .count()
}

/// Advances the turn machine by exactly one phase
///
/// `pending_user_text` is only meaningful when `current` is
/// [`NextAction::UserInput`]; `sink` enables streaming character responses.
/// Actor failure is fatal to the session (a half-spoken turn cannot be
/// safely resumed); observer failure is absorbed by the observer contract.
#[allow(clippy::too_many_arguments)]
pub async fn run_one_step(
    manager: &mut ConversationManager,
    actors: &ActorRegistry,
    observer: &dyn Observer,
    max_turns: u32,
    current: NextAction,
    pending_user_text: Option<&str>,
    user_exit: bool,
    max_messages_before_user: u32,
    sink: Option<&DeltaSink>,
) -> StepOutcome {
    let mut events = Vec::new();

    match current {
        NextAction::Ended => {
            return StepOutcome {
                next_action: NextAction::Ended,
                game_ended: manager.state().game_ended(),
                events,
            };
        }
        NextAction::Character => {
            let decision = manager.state().continuation_decision();
            let actor = actors
                .get(&decision.who_should_respond)
                .or_else(|| actors.first());
            let Some(actor) = actor else {
                events.push(GameEvent::Error {
                    message: "no actors registered for this session".to_string(),
                });
                manager.set_metadata("game_ended", json!(true));
                manager.set_metadata("game_ended_reason", json!("actor_error"));
                return StepOutcome {
                    next_action: NextAction::Ended,
                    game_ended: true,
                    events,
                };
            };
            debug!("character step: {} responds", actor.name());
            let history = manager.visible_history().to_vec();
            let response = match sink {
                Some(sink) => actor.respond_streaming(&history, sink).await,
                None => actor.respond(&history).await,
            };
            match response {
                Ok(text) => {
                    let message = manager.add_message(actor.name(), text, sink.is_some());
                    events.push(GameEvent::Message {
                        author: message.author.clone(),
                        content: message.content.clone(),
                        timestamp: message.timestamp,
                        turn: message.turn,
                    });
                }
                Err(e) => {
                    warn!("actor {} failed: {e:#}", actor.name());
                    events.push(GameEvent::Error {
                        message: format!("{} failed to respond: {e:#}", actor.name()),
                    });
                    manager.set_metadata("game_ended", json!(true));
                    manager.set_metadata("game_ended_reason", json!("actor_error"));
                    return StepOutcome {
                        next_action: NextAction::Ended,
                        game_ended: true,
                        events,
                    };
                }
            }
        }
        NextAction::UserInput => {
            if user_exit {
                manager.set_metadata("user_exit", json!(true));
                manager.set_metadata("game_ended", json!(true));
                manager.set_metadata("game_ended_reason", json!("user_exit"));
                events.push(GameEvent::GameEnded {
                    reason: "user_exit".to_string(),
                    mission_evaluation: manager.state().last_mission_evaluation(),
                });
                return StepOutcome {
                    next_action: NextAction::Ended,
                    game_ended: true,
                    events,
                };
            }
            let trimmed = pending_user_text.map(str::trim).unwrap_or("");
            if !trimmed.is_empty() {
                manager.add_message(PLAYER_AUTHOR, trimmed, false);
                manager.increment_turn();
            }
            // Empty input is a no-op turn: evaluation still runs so the
            // phase machine always makes progress.
        }
    }

    let verdict = observer.evaluate(manager.state()).await;
    let turn = manager.state().turn;
    if let Some(analysis) = verdict.analysis {
        manager.set_metadata(format!("turn_{turn}_analysis"), analysis);
    }
    if let Ok(decision) = serde_json::to_value(&verdict.continuation_decision) {
        manager.set_metadata("continuation_decision", decision);
    }
    if let Some(evaluation) = &verdict.mission_evaluation {
        if let Ok(value) = serde_json::to_value(evaluation) {
            manager.set_metadata("last_mission_evaluation", value.clone());
            manager.set_metadata(format!("turn_{turn}_mission_evaluation"), value);
        }
    }
    manager.set_metadata("game_ended", json!(verdict.game_ended));
    manager.set_metadata("game_ended_reason", json!(verdict.game_ended_reason));

    // An observer-declared end overrides whatever the router would decide.
    if manager.state().game_ended() {
        events.push(GameEvent::GameEnded {
            reason: manager.state().game_ended_reason(),
            mission_evaluation: manager.state().last_mission_evaluation(),
        });
        return StepOutcome {
            next_action: NextAction::Ended,
            game_ended: true,
            events,
        };
    }

    let mut next = route_continuation(&manager.state().continuation_decision(), &actors.names());
    if max_messages_before_user > 0
        && messages_since_user(&manager.state().messages) >= max_messages_before_user as usize
    {
        // The streak cap takes priority over the observer's preference.
        next = NextAction::UserInput;
    }
    if next == NextAction::Character
        && route_should_continue(manager.state(), max_turns) == Continuation::End
    {
        // Plain turn-limit exhaustion is a boundary condition, not a
        // narrative ending: no terminal event is emitted.
        return StepOutcome {
            next_action: NextAction::Ended,
            game_ended: false,
            events,
        };
    }

    StepOutcome {
        next_action: next,
        game_ended: false,
        events,
    }
}
