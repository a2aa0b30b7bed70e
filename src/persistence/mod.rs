//! Game persistence: records, the [`GameStore`] trait, and its backends
//!
//! A game is persisted as one [`GameRecord`] (metadata plus the latest state
//! snapshot) and an append-only [`MessageRecord`] log. The snapshot is
//! authoritative for rehydration; the message log is the durable transcript
//! and the fallback when a snapshot is missing or unreadable.

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    /// Unique game id
    pub id: String,
    /// Scenario title at creation time
    pub title: String,
    /// `"active"` or `"finished"`
    pub status: String,
    /// Owning user
    pub owner: String,
    /// Game mode label (`"scenario"` for generated, `"standard"` for fixed)
    pub game_mode: String,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Last save instant
    pub updated_at: DateTime<Utc>,
    /// Scenario setup, serialized verbatim at creation
    pub config_json: String,
    /// Latest state snapshot; empty until the first save
    #[serde(default)]
    pub state_json: String,
}

/// One message in the durable transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Game this message belongs to
    pub game_id: String,
    /// Player turn counter at append time
    pub turn_number: u32,
    /// Normalized role: `"player"`, `"director"`, or `"actor_<slug>"`
    pub role: String,
    /// Message content
    pub content: String,
    /// Extra fields (original author name, timestamp)
    #[serde(default)]
    pub metadata_json: String,
    /// Append instant
    pub created_at: DateTime<Utc>,
}

/// Listing row for a user's games
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    /// Game id
    pub id: String,
    /// Scenario title
    pub title: String,
    /// `"active"` or `"finished"`
    pub status: String,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Last save instant
    pub updated_at: DateTime<Utc>,
}

/// Durable storage for games and their transcripts
///
/// Implementations return [`crate::error::AgoraError::GameNotFound`] for
/// per-game operations on an unknown id. `save_state` flips the record's
/// status to `"finished"` when the snapshot's metadata says the game ended.
pub trait GameStore: Send + Sync {
    /// Creates a game record and returns its new id
    fn create_game(
        &self,
        title: &str,
        config_json: &str,
        owner: &str,
        game_mode: &str,
    ) -> Result<String>;

    /// Overwrites the game's state snapshot
    fn save_state(&self, game_id: &str, state_json: &str) -> Result<()>;

    /// Appends one message to the game's transcript
    fn append_message(
        &self,
        game_id: &str,
        turn_number: u32,
        role: &str,
        content: &str,
        metadata_json: &str,
    ) -> Result<()>;

    /// Fetches a game record
    fn get_game(&self, game_id: &str) -> Result<GameRecord>;

    /// Fetches the game's transcript in append order
    fn get_messages(&self, game_id: &str) -> Result<Vec<MessageRecord>>;

    /// Lists the owner's games, most recently updated first
    fn list_games(&self, owner: &str) -> Result<Vec<GameSummary>>;
}

/// Whether a state snapshot marks the game as ended
pub(crate) fn snapshot_says_ended(state_json: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(state_json)
        .ok()
        .and_then(|v| {
            v.get("metadata")
                .and_then(|m| m.get("game_ended"))
                .and_then(|b| b.as_bool())
        })
        .unwrap_or(false)
}
