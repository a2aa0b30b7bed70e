//! Sled-backed game store
//!
//! Games and messages live in separate trees. Game records are keyed by
//! their ULID; message keys are `<game_id>:<seq>` with a zero-padded
//! monotonic sequence so a prefix scan returns the transcript in append
//! order.

use crate::error::{AgoraError, Result};
use crate::persistence::{
    snapshot_says_ended, GameRecord, GameStore, GameSummary, MessageRecord,
};
use chrono::Utc;
use std::path::Path;
use tracing::debug;
use ulid::Ulid;

const GAMES_TREE: &str = "games";
const MESSAGES_TREE: &str = "messages";

/// [`GameStore`] backed by an embedded sled database
pub struct SledStore {
    db: sled::Db,
    games: sled::Tree,
    messages: sled::Tree,
}

impl SledStore {
    /// Opens (or creates) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path.as_ref())
            .map_err(|e| AgoraError::Storage(format!("failed to open database: {e}")))?;
        let games = db
            .open_tree(GAMES_TREE)
            .map_err(|e| AgoraError::Storage(format!("failed to open games tree: {e}")))?;
        let messages = db
            .open_tree(MESSAGES_TREE)
            .map_err(|e| AgoraError::Storage(format!("failed to open messages tree: {e}")))?;
        debug!("opened game store at {}", path.as_ref().display());
        Ok(Self { db, games, messages })
    }

    fn load_record(&self, game_id: &str) -> Result<GameRecord> {
        let bytes = self
            .games
            .get(game_id.as_bytes())
            .map_err(|e| AgoraError::Storage(format!("failed to read game: {e}")))?
            .ok_or_else(|| AgoraError::GameNotFound(game_id.to_string()))?;
        let record = serde_json::from_slice(&bytes).map_err(AgoraError::Serialization)?;
        Ok(record)
    }

    fn store_record(&self, record: &GameRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record).map_err(AgoraError::Serialization)?;
        self.games
            .insert(record.id.as_bytes(), bytes)
            .map_err(|e| AgoraError::Storage(format!("failed to write game: {e}")))?;
        self.games
            .flush()
            .map_err(|e| AgoraError::Storage(format!("failed to flush games: {e}")))?;
        Ok(())
    }
}

impl GameStore for SledStore {
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
        self.store_record(&record)?;
        debug!("created game {id} for {owner}");
        Ok(id)
    }

    fn save_state(&self, game_id: &str, state_json: &str) -> Result<()> {
        let mut record = self.load_record(game_id)?;
        record.state_json = state_json.to_string();
        record.updated_at = Utc::now();
        if snapshot_says_ended(state_json) {
            record.status = "finished".to_string();
        }
        self.store_record(&record)
    }

    fn append_message(
        &self,
        game_id: &str,
        turn_number: u32,
        role: &str,
        content: &str,
        metadata_json: &str,
    ) -> Result<()> {
        // Existence check keeps the transcript free of orphan messages.
        self.load_record(game_id)?;
        let seq = self
            .db
            .generate_id()
            .map_err(|e| AgoraError::Storage(format!("failed to generate sequence: {e}")))?;
        let record = MessageRecord {
            game_id: game_id.to_string(),
            turn_number,
            role: role.to_string(),
            content: content.to_string(),
            metadata_json: metadata_json.to_string(),
            created_at: Utc::now(),
        };
        let key = format!("{game_id}:{seq:020}");
        let bytes = serde_json::to_vec(&record).map_err(AgoraError::Serialization)?;
        self.messages
            .insert(key.as_bytes(), bytes)
            .map_err(|e| AgoraError::Storage(format!("failed to write message: {e}")))?;
        self.messages
            .flush()
            .map_err(|e| AgoraError::Storage(format!("failed to flush messages: {e}")))?;
        Ok(())
    }

    fn get_game(&self, game_id: &str) -> Result<GameRecord> {
        self.load_record(game_id)
    }

    fn get_messages(&self, game_id: &str) -> Result<Vec<MessageRecord>> {
        self.load_record(game_id)?;
        let prefix = format!("{game_id}:");
        let mut records = Vec::new();
        for entry in self.messages.scan_prefix(prefix.as_bytes()) {
            let (_key, bytes) =
                entry.map_err(|e| AgoraError::Storage(format!("failed to scan messages: {e}")))?;
            let record: MessageRecord =
                serde_json::from_slice(&bytes).map_err(AgoraError::Serialization)?;
            records.push(record);
        }
        Ok(records)
    }

    fn list_games(&self, owner: &str) -> Result<Vec<GameSummary>> {
        let mut summaries = Vec::new();
        for entry in self.games.iter() {
            let (_key, bytes) =
                entry.map_err(|e| AgoraError::Storage(format!("failed to scan games: {e}")))?;
            let record: GameRecord =
                serde_json::from_slice(&bytes).map_err(AgoraError::Serialization)?;
            if record.owner == owner {
                summaries.push(GameSummary {
                    id: record.id,
                    title: record.title,
                    status: record.status,
                    created_at: record.created_at,
                    updated_at: record.updated_at,
                });
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_not_found;
    use tempfile::TempDir;

    fn open_store() -> (SledStore, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let store = SledStore::open(dir.path().join("games.db")).expect("open");
        (store, dir)
    }

    #[test]
    fn test_create_and_get_game() {
        let (store, _dir) = open_store();
        let id = store
            .create_game("The Vault", "{}", "alice", "scenario")
            .expect("create");

        let record = store.get_game(&id).expect("get");
        assert_eq!(record.title, "The Vault");
        assert_eq!(record.status, "active");
        assert_eq!(record.owner, "alice");
        assert_eq!(record.game_mode, "scenario");
        assert!(record.state_json.is_empty());
    }

    #[test]
    fn test_unknown_game_is_not_found() {
        let (store, _dir) = open_store();
        let err = store.get_game("nope").unwrap_err();
        assert!(is_not_found(&err));
    }

    #[test]
    fn test_save_state_marks_finished() {
        let (store, _dir) = open_store();
        let id = store
            .create_game("T", "{}", "alice", "scenario")
            .expect("create");

        store
            .save_state(&id, r#"{"metadata": {"game_ended": false}}"#)
            .expect("save");
        assert_eq!(store.get_game(&id).expect("get").status, "active");

        store
            .save_state(&id, r#"{"metadata": {"game_ended": true}}"#)
            .expect("save");
        assert_eq!(store.get_game(&id).expect("get").status, "finished");
    }

    #[test]
    fn test_messages_preserve_append_order() {
        let (store, _dir) = open_store();
        let id = store
            .create_game("T", "{}", "alice", "scenario")
            .expect("create");

        for i in 0..5 {
            store
                .append_message(&id, i, "player", &format!("msg {i}"), "{}")
                .expect("append");
        }

        let messages = store.get_messages(&id).expect("get");
        assert_eq!(messages.len(), 5);
        for (i, record) in messages.iter().enumerate() {
            assert_eq!(record.content, format!("msg {i}"));
        }
    }

    #[test]
    fn test_messages_isolated_per_game() {
        let (store, _dir) = open_store();
        let a = store.create_game("A", "{}", "alice", "scenario").expect("create");
        let b = store.create_game("B", "{}", "alice", "scenario").expect("create");

        store.append_message(&a, 0, "player", "for a", "{}").expect("append");
        store.append_message(&b, 0, "player", "for b", "{}").expect("append");

        let messages = store.get_messages(&a).expect("get");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "for a");
    }

    #[test]
    fn test_append_to_unknown_game_fails() {
        let (store, _dir) = open_store();
        let err = store
            .append_message("nope", 0, "player", "hi", "{}")
            .unwrap_err();
        assert!(is_not_found(&err));
    }

    #[test]
    fn test_list_games_filters_by_owner() {
        let (store, _dir) = open_store();
        store.create_game("A", "{}", "alice", "scenario").expect("create");
        store.create_game("B", "{}", "bob", "scenario").expect("create");
        store.create_game("C", "{}", "alice", "standard").expect("create");

        let games = store.list_games("alice").expect("list");
        assert_eq!(games.len(), 2);
        assert!(games.iter().all(|g| g.title != "B"));
    }

    #[test]
    fn test_reopen_preserves_data() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("games.db");
        let id = {
            let store = SledStore::open(&path).expect("open");
            let id = store
                .create_game("Persistent", "{}", "alice", "scenario")
                .expect("create");
            store.append_message(&id, 0, "player", "hello", "{}").expect("append");
            id
        };

        let store = SledStore::open(&path).expect("reopen");
        assert_eq!(store.get_game(&id).expect("get").title, "Persistent");
        assert_eq!(store.get_messages(&id).expect("get").len(), 1);
    }
}
