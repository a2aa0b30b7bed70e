//! Conversation state: the message log, turn counter and decision metadata
//!
//! [`ConversationState`] is the single source of truth for a running game.
//! The observer's decision artifacts travel through the `metadata` map; the
//! helpers here give typed access to the keys the router and engine read.

use crate::agents::ContinuationDecision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Author name used for every message the human player contributes
pub const PLAYER_AUTHOR: &str = "Player";

/// A single message in the conversation ledger
///
/// Immutable once appended. `turn` is the turn counter at append time; it is
/// non-decreasing across the log but not unique per message (character
/// messages do not advance the turn).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Author name (an actor name or [`PLAYER_AUTHOR`])
    pub author: String,
    /// Message text
    pub content: String,
    /// Wall-clock time at append
    pub timestamp: DateTime<Utc>,
    /// Turn counter at append time
    pub turn: u32,
    /// True when the content was already shown to the user by a side
    /// channel (e.g. streamed token-by-token), so readers need not re-emit it
    #[serde(default)]
    pub displayed: bool,
}

/// Authoritative state of one conversation
///
/// Owned by the [`ConversationManager`](crate::manager::ConversationManager);
/// everything else reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// Append-ordered message log
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Player turn counter, increments only on player contributions
    #[serde(default)]
    pub turn: u32,
    /// Free-form metadata map carrying the last decision artifacts
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ConversationState {
    /// Reads a boolean metadata key, defaulting to false
    pub fn metadata_bool(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Reads a string metadata key, defaulting to empty
    pub fn metadata_str(&self, key: &str) -> String {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// True when the observer (or the engine) has declared the game over
    pub fn game_ended(&self) -> bool {
        self.metadata_bool("game_ended")
    }

    /// Reason recorded alongside `game_ended`
    pub fn game_ended_reason(&self) -> String {
        self.metadata_str("game_ended_reason")
    }

    /// True when the player requested to exit
    pub fn user_exit(&self) -> bool {
        self.metadata_bool("user_exit")
    }

    /// The observer's most recent continuation decision
    ///
    /// Falls back to the safe default (no response needed) when the key is
    /// absent or malformed, so routing always has something to work with.
    pub fn continuation_decision(&self) -> ContinuationDecision {
        self.metadata
            .get("continuation_decision")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// The observer's most recent mission evaluation, if any
    pub fn last_mission_evaluation(&self) -> Option<Value> {
        self.metadata.get("last_mission_evaluation").cloned()
    }
}
