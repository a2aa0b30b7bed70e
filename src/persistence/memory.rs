//! In-memory game store
//!
//! Behaviorally equivalent to the sled backend, for tests and ephemeral
//! runs. Clones share the same underlying storage, which lets restart tests
//! drop one engine and hand the same store to a fresh one.

use crate::error::{AgoraError, Result};
use crate::persistence::{
    snapshot_says_ended, GameRecord, GameStore, GameSummary, MessageRecord,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use ulid::Ulid;

#[derive(Default)]
struct Inner {
    games: HashMap<String, GameRecord>,
    messages: HashMap<String, Vec<MessageRecord>>,
}

/// [`GameStore`] held entirely in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for MemoryStore {
    fn create_game(
        &self,
        title: &str,
        config_json: &str,
        owner: &str,
        game_mode: &str,
    ) -> Result<String> {
        let id = Ulid::new().to_string();
        let now = Utc::now();
        let record = GameRecord {
            id: id.clone(),
            title: title.to_string(),
            status: "active".to_string(),
            owner: owner.to_string(),
            game_mode: game_mode.to_string(),
            created_at: now,
            updated_at: now,
            config_json: config_json.to_string(),
            state_json: String::new(),
        };
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.games.insert(id.clone(), record);
        inner.messages.insert(id.clone(), Vec::new());
        Ok(id)
    }

    fn save_state(&self, game_id: &str, state_json: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let record = inner
            .games
            .get_mut(game_id)
            .ok_or_else(|| AgoraError::GameNotFound(game_id.to_string()))?;
        record.state_json = state_json.to_string();
        record.updated_at = Utc::now();
        if snapshot_says_ended(state_json) {
            record.status = "finished".to_string();
        }
        Ok(())
    }

    fn append_message(
        &self,
        game_id: &str,
        turn_number: u32,
        role: &str,
        content: &str,
        metadata_json: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !inner.games.contains_key(game_id) {
            return Err(AgoraError::GameNotFound(game_id.to_string()).into());
        }
        inner
            .messages
            .entry(game_id.to_string())
            .or_default()
            .push(MessageRecord {
                game_id: game_id.to_string(),
                turn_number,
                role: role.to_string(),
                content: content.to_string(),
                metadata_json: metadata_json.to_string(),
                created_at: Utc::now(),
            });
        Ok(())
    }

    fn get_game(&self, game_id: &str) -> Result<GameRecord> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .games
            .get(game_id)
            .cloned()
            .ok_or_else(|| AgoraError::GameNotFound(game_id.to_string()).into())
    }

    fn get_messages(&self, game_id: &str) -> Result<Vec<MessageRecord>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !inner.games.contains_key(game_id) {
            return Err(AgoraError::GameNotFound(game_id.to_string()).into());
        }
        Ok(inner.messages.get(game_id).cloned().unwrap_or_default())
    }

    fn list_games(&self, owner: &str) -> Result<Vec<GameSummary>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut summaries: Vec<GameSummary> = inner
            .games
            .values()
            .filter(|r| r.owner == owner)
            .map(|r| GameSummary {
                id: r.id.clone(),
                title: r.title.clone(),
                status: r.status.clone(),
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}
