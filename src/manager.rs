//! Conversation ledger: controlled access to the conversation state
//!
//! The manager is a dumb, always-consistent accumulator. It stamps messages
//! with the current turn and wall-clock time; it performs no validation of
//! author identity (that is the step executor's job) and never evicts.

use crate::state::{ConversationState, Message};
use chrono::Utc;
use serde_json::Value;

/// Owns the [`ConversationState`] and provides controlled mutation
#[derive(Debug, Default)]
pub struct ConversationManager {
    state: ConversationState,
}

impl ConversationManager {
    /// Creates a manager with an empty state (no messages, turn 0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Appends a message stamped with the current turn and wall-clock time
    ///
    /// Does not mutate the turn counter. Returns a reference to the
    /// appended message.
    pub fn add_message(
        &mut self,
        author: impl Into<String>,
        content: impl Into<String>,
        displayed: bool,
    ) -> &Message {
        let message = Message {
            author: author.into(),
            content: content.into(),
            timestamp: Utc::now(),
            turn: self.state.turn,
            displayed,
        };
        self.state.messages.push(message);
        self.state
            .messages
            .last()
            .expect("message was just pushed")
    }

    /// Increments the player turn counter
    pub fn increment_turn(&mut self) {
        self.state.turn += 1;
    }

    /// Stores a value in the metadata map, replacing any previous value
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.state.metadata.insert(key.into(), value);
    }

    /// Reads a value from the metadata map
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.state.metadata.get(key)
    }

    /// Returns the history visible to actor agents
    ///
    /// Currently the full log; kept as a seam so visibility filtering can be
    /// added without touching callers.
    pub fn visible_history(&self) -> &[Message] {
        &self.state.messages
    }

    /// Replaces the entire state, used when rehydrating from storage
    pub fn restore(&mut self, state: ConversationState) {
        self.state = state;
    }
}
