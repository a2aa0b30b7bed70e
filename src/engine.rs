//! Game engine: session registry, step loops, and checkpointing
//!
//! The engine owns the process-wide registry of live sessions and mediates
//! every interaction with a game: creation, player input, polling ticks,
//! streaming turns, and rehydration after a restart. Each session sits
//! behind its own async mutex, so concurrent requests for the same game are
//! serialized while different games proceed in parallel.

use crate::agents::{ActorRegistry, AgentFactory, Observer};
use crate::config::EngineConfig;
use crate::director::{run_one_step, GameEvent, NextAction};
use crate::error::{AgoraError, Result};
use crate::manager::ConversationManager;
use crate::persistence::{GameStore, GameSummary};
use crate::scenario::{ScenarioGenerator, ScenarioSetup};
use crate::state::{ConversationState, Message, PLAYER_AUTHOR};
use crate::stream::{bridge, DeltaSink};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

/// One in-memory, resumable instance of a running game
pub struct GameSession {
    /// The authoritative conversation ledger
    pub manager: ConversationManager,
    /// NPC actors in registration order
    pub actors: ActorRegistry,
    /// The session's observer
    pub observer: Arc<dyn Observer>,
    /// Scenario the session was built from, immutable
    pub setup: ScenarioSetup,
    /// Player turns before the session stops advancing
    pub max_turns: u32,
    /// Non-player streak cap; 0 disables it
    pub max_messages_before_user: u32,
    /// Current phase of the turn machine
    pub next_action: NextAction,
    /// Count of ledger messages already written to the append-only log
    pub persisted_messages: usize,
}

/// Result of [`GameEngine::resume_game`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeInfo {
    /// The resumed game id
    pub session_id: String,
    /// True when the session was already resident in the registry
    pub loaded_from_memory: bool,
}

/// Terminal result reported once a game has finished
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResult {
    /// Why the game ended
    pub reason: String,
    /// Last mission evaluation, when one was recorded
    pub mission_evaluation: Option<Value>,
}

/// Status contract for frontends polling a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStatus {
    /// Player turns consumed so far
    pub turn_current: u32,
    /// Turn limit for this session
    pub turn_max: u32,
    /// Who the observer expects to speak next; empty when it is the player
    pub current_speaker: String,
    /// True when the machine is waiting for player text
    pub player_can_write: bool,
    /// True when the game has ended
    pub game_finished: bool,
    /// Terminal result, present only when finished
    pub result: Option<GameResult>,
    /// Full visible transcript
    pub messages: Vec<Message>,
}

/// Stable scenario context for a frontend's side panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameContext {
    /// The player's win condition
    pub player_mission: String,
    /// NPC personas
    pub characters: Vec<crate::scenario::ActorSpec>,
    /// Setting description
    pub setting: String,
    /// The problem the scene revolves around
    pub problem_context: String,
    /// Why the player matters in this scene
    pub player_relevance: String,
    /// Narration shown before the first turn
    pub opening_narrative: String,
}

/// Result of one [`GameEngine::tick`] call
#[derive(Debug)]
pub struct TickResult {
    /// Events produced by the tick, empty when waiting
    pub events: Vec<GameEvent>,
    /// Ledger state after the tick
    pub state: ConversationState,
    /// Whether the game ended during the tick
    pub game_ended: bool,
    /// True when no character step was due
    pub waiting_for_player: bool,
}

type SessionHandle = Arc<tokio::sync::Mutex<GameSession>>;

/// The session registry and step-loop orchestrator
pub struct GameEngine {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    store: Arc<dyn GameStore>,
    factory: Arc<dyn AgentFactory>,
    generator: Arc<dyn ScenarioGenerator>,
    defaults: EngineConfig,
}

impl GameEngine {
    /// Creates an engine over the given collaborators
    pub fn new(
        store: Arc<dyn GameStore>,
        factory: Arc<dyn AgentFactory>,
        generator: Arc<dyn ScenarioGenerator>,
        defaults: EngineConfig,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            store,
            factory,
            generator,
            defaults,
        }
    }

    /// Creates a game from a generated scenario and warms it up to the
    /// first point where the player is expected to act
    ///
    /// Scenario generation is contracted to never fail; the generator falls
    /// back to a built-in default internally.
    pub async fn create_game(
        &self,
        theme: Option<&str>,
        owner: &str,
    ) -> Result<(String, ScenarioSetup)> {
        let setup = self.generator.generate(theme, self.defaults.actor_count).await;
        self.register_new_game(setup, owner, "scenario").await
    }

    /// Creates a game from a caller-provided setup, skipping generation
    ///
    /// # Errors
    ///
    /// Returns [`AgoraError::InvalidSetup`] when the setup has no usable
    /// actors; nothing is persisted and no session is registered.
    pub async fn create_game_from_setup(
        &self,
        setup: ScenarioSetup,
        owner: &str,
    ) -> Result<(String, ScenarioSetup)> {
        self.register_new_game(setup, owner, "standard").await
    }

    async fn register_new_game(
        &self,
        setup: ScenarioSetup,
        owner: &str,
        game_mode: &str,
    ) -> Result<(String, ScenarioSetup)> {
        // Validation happens before any persistence write, so a bad setup
        // leaves no partial game behind.
        let session = self.build_session(&setup)?;
        let title = if setup.title.trim().is_empty() {
            "Untitled game".to_string()
        } else {
            setup.title.trim().to_string()
        };
        let config_json = serde_json::to_string(&setup).map_err(AgoraError::Serialization)?;
        let game_id = self
            .store
            .create_game(&title, &config_json, owner, game_mode)?;
        info!("created game {game_id} ({title}) for {owner}");

        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(session));
        self.register(&game_id, Arc::clone(&handle));
        self.warmup(&game_id, &handle).await?;
        Ok((game_id, setup))
    }

    fn build_session(&self, setup: &ScenarioSetup) -> Result<GameSession> {
        let names = setup.actor_names();
        if names.is_empty() {
            return Err(AgoraError::InvalidSetup("setup has no usable actors".to_string()).into());
        }
        let mut actors = ActorRegistry::new();
        for spec in &setup.actors {
            if spec.name.trim().is_empty() {
                continue;
            }
            actors.register(self.factory.build_actor(spec));
        }
        let observer = self.factory.build_observer(&names, &setup.player_mission);
        Ok(GameSession {
            manager: ConversationManager::new(),
            actors,
            observer,
            setup: setup.clone(),
            max_turns: self.defaults.max_turns,
            max_messages_before_user: self.defaults.max_messages_before_user,
            next_action: NextAction::Character,
            persisted_messages: 0,
        })
    }

    /// Advances a fresh session to the first player prompt and writes the
    /// initial checkpoint
    async fn warmup(&self, game_id: &str, handle: &SessionHandle) -> Result<()> {
        let mut session = handle.lock().await;
        let (events, _game_ended) = run_step_loop(&mut session, None, false, None).await;
        debug!("warmup game_id={game_id}, events={}", events.len());
        checkpoint(self.store.as_ref(), game_id, &mut session)
    }

    fn register(&self, game_id: &str, handle: SessionHandle) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(game_id.to_string(), handle);
    }

    fn resident(&self, game_id: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(game_id).cloned()
    }

    /// Returns the session handle, rehydrating from storage when absent
    fn session(&self, game_id: &str) -> Result<SessionHandle> {
        if let Some(handle) = self.resident(game_id) {
            return Ok(handle);
        }
        let session = self.rehydrate(game_id)?;
        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(session));
        self.register(game_id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Resumes a game, rehydrating from storage when not resident
    ///
    /// # Errors
    ///
    /// Returns [`AgoraError::GameNotFound`] for an unknown id and
    /// [`AgoraError::CannotResume`] for a record whose config has no usable
    /// actors.
    pub fn resume_game(&self, game_id: &str) -> Result<ResumeInfo> {
        if self.resident(game_id).is_some() {
            return Ok(ResumeInfo {
                session_id: game_id.to_string(),
                loaded_from_memory: true,
            });
        }
        self.session(game_id)?;
        Ok(ResumeInfo {
            session_id: game_id.to_string(),
            loaded_from_memory: false,
        })
    }

    fn rehydrate(&self, game_id: &str) -> Result<GameSession> {
        let record = self.store.get_game(game_id)?;
        let setup: ScenarioSetup = serde_json::from_str(&record.config_json)
            .map_err(|e| AgoraError::CannotResume(format!("invalid config: {e}")))?;
        let names = setup.actor_names();
        if names.is_empty() {
            return Err(AgoraError::CannotResume("no valid actors".to_string()).into());
        }
        let mut actors = ActorRegistry::new();
        for spec in &setup.actors {
            if spec.name.trim().is_empty() {
                continue;
            }
            actors.register(self.factory.build_actor(spec));
        }
        let observer = self.factory.build_observer(&names, &setup.player_mission);

        let snapshot: Value = if record.state_json.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&record.state_json).unwrap_or_else(|_| json!({}))
        };

        let mut messages = restore_messages(&snapshot);
        if messages.is_empty() {
            // Legacy records predate embedding messages in the snapshot;
            // rebuild the ledger from the append-only log instead.
            messages = restore_from_log(self.store.get_messages(game_id)?);
        }

        let metadata: HashMap<String, Value> = snapshot
            .get("metadata")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let turn = snapshot
            .get("turn")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let max_turns = snapshot
            .get("max_turns")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(self.defaults.max_turns);
        let max_messages_before_user = snapshot
            .get("max_messages_before_user")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(self.defaults.max_messages_before_user);
        let next_action = NextAction::parse_lossy(snapshot.get("next_action"));

        let persisted_messages = messages.len();
        let mut manager = ConversationManager::new();
        manager.restore(ConversationState {
            messages,
            turn,
            metadata,
        });
        info!(
            "rehydrated game {game_id}: turn={turn}, messages={persisted_messages}, \
             next_action={next_action:?}"
        );

        Ok(GameSession {
            manager,
            actors,
            observer,
            setup,
            max_turns,
            max_messages_before_user,
            next_action,
            persisted_messages,
        })
    }

    /// Applies player text and advances character steps until the machine
    /// needs the player again or the game ends
    ///
    /// Returns the accumulated events, the resulting state, and whether the
    /// game ended. The session is checkpointed before returning.
    pub async fn player_input(
        &self,
        game_id: &str,
        text: &str,
        user_exit: bool,
    ) -> Result<(Vec<GameEvent>, ConversationState, bool)> {
        let handle = self.session(game_id)?;
        let mut session = handle.lock().await;
        let started = Instant::now();

        let (events, game_ended) =
            run_step_loop(&mut session, Some(text), user_exit, None).await;
        debug!(
            "player_input game_id={game_id}, events={}, game_ended={game_ended}, elapsed={:.2}s",
            events.len(),
            started.elapsed().as_secs_f64()
        );
        checkpoint(self.store.as_ref(), game_id, &mut session)?;
        Ok((events, session.manager.state().clone(), game_ended))
    }

    /// Executes one character step when one is due
    ///
    /// When the session does not expect a character step, returns
    /// immediately with `waiting_for_player=true` and no events; safe to
    /// poll repeatedly.
    pub async fn tick(&self, game_id: &str) -> Result<TickResult> {
        let handle = self.session(game_id)?;
        let mut guard = handle.lock().await;
        let session = &mut *guard;
        if session.next_action != NextAction::Character {
            return Ok(TickResult {
                events: Vec::new(),
                state: session.manager.state().clone(),
                game_ended: false,
                waiting_for_player: true,
            });
        }

        let started = Instant::now();
        let observer = Arc::clone(&session.observer);
        let outcome = run_one_step(
            &mut session.manager,
            &session.actors,
            observer.as_ref(),
            session.max_turns,
            session.next_action,
            None,
            false,
            session.max_messages_before_user,
            None,
        )
        .await;
        session.next_action = outcome.next_action;
        debug!(
            "tick game_id={game_id}, events={}, game_ended={}, elapsed={:.2}s",
            outcome.events.len(),
            outcome.game_ended,
            started.elapsed().as_secs_f64()
        );
        checkpoint(self.store.as_ref(), game_id, session)?;
        Ok(TickResult {
            events: outcome.events,
            state: session.manager.state().clone(),
            game_ended: outcome.game_ended,
            waiting_for_player: false,
        })
    }

    /// Runs the same loop as [`GameEngine::player_input`] on a worker task,
    /// forwarding character-generation deltas live
    ///
    /// The worker is never cancelled: even if the consumer stops reading,
    /// the loop runs to completion and its checkpoint lands before the
    /// session mutex is released.
    pub fn execute_turn_stream(
        &self,
        game_id: &str,
        text: &str,
        user_exit: bool,
    ) -> Result<impl Stream<Item = GameEvent> + Send> {
        let handle = self.session(game_id)?;
        let store = Arc::clone(&self.store);
        let game_id = game_id.to_string();
        let text = text.to_string();

        Ok(bridge(move |sink| async move {
            let mut session = handle.lock().await;
            let (events, _game_ended) =
                run_step_loop(&mut session, Some(&text), user_exit, Some(&sink)).await;
            checkpoint(store.as_ref(), &game_id, &mut session)?;
            Ok(events)
        }))
    }

    /// Returns a clone of the game's current ledger state
    pub async fn get_state(&self, game_id: &str) -> Result<ConversationState> {
        let handle = self.session(game_id)?;
        let session = handle.lock().await;
        Ok(session.manager.state().clone())
    }

    /// Returns the polling status contract for a game
    pub async fn get_status(&self, game_id: &str) -> Result<GameStatus> {
        let handle = self.session(game_id)?;
        let session = handle.lock().await;
        let state = session.manager.state();

        let mut current_speaker = state.continuation_decision().who_should_respond;
        if current_speaker == "user" || current_speaker == "none" {
            current_speaker = String::new();
        }
        let game_finished = state.game_ended();
        let result = game_finished.then(|| GameResult {
            reason: state.game_ended_reason(),
            mission_evaluation: state.last_mission_evaluation(),
        });
        Ok(GameStatus {
            turn_current: state.turn,
            turn_max: session.max_turns,
            current_speaker,
            player_can_write: session.next_action == NextAction::UserInput,
            game_finished,
            result,
            messages: state.messages.clone(),
        })
    }

    /// Returns the stable scenario context for a game
    pub async fn get_context(&self, game_id: &str) -> Result<GameContext> {
        let handle = self.session(game_id)?;
        let session = handle.lock().await;
        let setup = &session.setup;
        Ok(GameContext {
            player_mission: setup.player_mission.clone(),
            characters: setup.actors.clone(),
            setting: setup.setting.clone(),
            problem_context: setup.problem_context.clone(),
            player_relevance: setup.player_relevance.clone(),
            opening_narrative: setup.opening_narrative.clone(),
        })
    }

    /// Lists the owner's games, most recently updated first
    pub fn list_games(&self, owner: &str) -> Result<Vec<GameSummary>> {
        self.store.list_games(owner)
    }

    /// Whether the game record belongs to the given owner
    pub fn game_belongs_to_user(&self, game_id: &str, owner: &str) -> Result<bool> {
        let record = self.store.get_game(game_id)?;
        Ok(record.owner == owner)
    }
}

/// Runs the first step with the player's pending text, then further
/// character steps until the machine needs the player again or ends
async fn run_step_loop(
    session: &mut GameSession,
    text: Option<&str>,
    user_exit: bool,
    sink: Option<&DeltaSink>,
) -> (Vec<GameEvent>, bool) {
    let mut all_events = Vec::new();
    let observer = Arc::clone(&session.observer);
    let mut outcome = run_one_step(
        &mut session.manager,
        &session.actors,
        observer.as_ref(),
        session.max_turns,
        session.next_action,
        text,
        user_exit,
        session.max_messages_before_user,
        sink,
    )
    .await;
    session.next_action = outcome.next_action;
    all_events.append(&mut outcome.events);

    while outcome.next_action == NextAction::Character && !outcome.game_ended {
        outcome = run_one_step(
            &mut session.manager,
            &session.actors,
            observer.as_ref(),
            session.max_turns,
            session.next_action,
            None,
            false,
            session.max_messages_before_user,
            sink,
        )
        .await;
        session.next_action = outcome.next_action;
        all_events.append(&mut outcome.events);
    }
    (all_events, outcome.game_ended)
}

/// Maps a ledger author to the normalized role stored in the message log
fn map_role(author: &str) -> String {
    if author == PLAYER_AUTHOR {
        return "player".to_string();
    }
    if author == "System" || author == "system" {
        return "director".to_string();
    }
    let safe = author.trim().replace(' ', "_").to_lowercase();
    if safe.is_empty() {
        return "actor".to_string();
    }
    format!("actor_{safe}")
}

/// Writes the session's new messages to the append-only log, then
/// overwrites the state snapshot
///
/// The `persisted_messages` watermark makes this idempotent: re-running
/// with no new messages appends no duplicate log rows.
pub(crate) fn checkpoint(
    store: &dyn GameStore,
    game_id: &str,
    session: &mut GameSession,
) -> Result<()> {
    let snapshot = {
        let state = session.manager.state();
        for message in &state.messages[session.persisted_messages..] {
            let metadata = json!({
                "author": message.author,
                "timestamp": message.timestamp.to_rfc3339(),
            });
            store.append_message(
                game_id,
                message.turn,
                &map_role(&message.author),
                &message.content,
                &metadata.to_string(),
            )?;
        }
        serde_json::to_string(&json!({
            "turn": state.turn,
            "messages": state.messages,
            "metadata": state.metadata,
            "next_action": session.next_action,
            "max_turns": session.max_turns,
            "max_messages_before_user": session.max_messages_before_user,
        }))
        .map_err(AgoraError::Serialization)?
    };
    session.persisted_messages = session.manager.state().messages.len();
    store.save_state(game_id, &snapshot)
}

fn restore_messages(snapshot: &Value) -> Vec<Message> {
    let Some(raw) = snapshot.get("messages").and_then(Value::as_array) else {
        return Vec::new();
    };
    raw.iter()
        .filter_map(|m| serde_json::from_value::<Message>(m.clone()).ok())
        .collect()
}

fn restore_from_log(records: Vec<crate::persistence::MessageRecord>) -> Vec<Message> {
    records
        .into_iter()
        .map(|record| {
            let metadata: Value =
                serde_json::from_str(&record.metadata_json).unwrap_or_else(|_| json!({}));
            let author = metadata
                .get("author")
                .and_then(Value::as_str)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| record.role.clone());
            let timestamp = metadata
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(record.created_at);
            Message {
                author,
                content: record.content,
                timestamp,
                turn: record.turn_number,
                displayed: false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ScriptedFactory;
    use crate::persistence::MemoryStore;
    use crate::scenario::{ActorSpec, FixedScenarioGenerator};

    fn test_setup() -> ScenarioSetup {
        ScenarioSetup {
            title: "The Vault".to_string(),
            player_mission: "Convince Livia to open the vault.".to_string(),
            actors: vec![ActorSpec {
                name: "Livia".to_string(),
                personality: "Guarded archivist.".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn test_engine(store: MemoryStore) -> GameEngine {
        GameEngine::new(
            Arc::new(store),
            Arc::new(ScriptedFactory::new()),
            Arc::new(FixedScenarioGenerator::new(test_setup())),
            EngineConfig::default(),
        )
    }

    #[test]
    fn test_map_role() {
        assert_eq!(map_role(PLAYER_AUTHOR), "player");
        assert_eq!(map_role("System"), "director");
        assert_eq!(map_role("Livia"), "actor_livia");
        assert_eq!(map_role("Old Maren"), "actor_old_maren");
        assert_eq!(map_role(""), "actor");
    }

    #[tokio::test]
    async fn test_create_game_warms_up_to_player_prompt() {
        let engine = test_engine(MemoryStore::new());
        let (game_id, setup) = engine.create_game(None, "alice").await.expect("create");

        assert_eq!(setup.title, "The Vault");
        let status = engine.get_status(&game_id).await.expect("status");
        assert!(status.player_can_write);
        assert!(!status.messages.is_empty(), "warmup produced the opening line");
        assert!(!status.game_finished);
    }

    #[tokio::test]
    async fn test_create_game_from_setup_rejects_actorless() {
        let store = MemoryStore::new();
        let engine = test_engine(store.clone());
        let setup = ScenarioSetup {
            title: "Empty".to_string(),
            ..Default::default()
        };

        let err = engine
            .create_game_from_setup(setup, "alice")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgoraError>(),
            Some(AgoraError::InvalidSetup(_))
        ));
        // No partial game was persisted.
        assert!(store.list_games("alice").expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_checkpoint_watermark_is_idempotent() {
        let store = MemoryStore::new();
        let engine = test_engine(store.clone());
        let (game_id, _) = engine.create_game(None, "alice").await.expect("create");

        let before = store.get_messages(&game_id).expect("messages").len();
        let handle = engine.session(&game_id).expect("session");
        let mut session = handle.lock().await;
        checkpoint(&store, &game_id, &mut session).expect("checkpoint");
        checkpoint(&store, &game_id, &mut session).expect("checkpoint");

        let after = store.get_messages(&game_id).expect("messages").len();
        assert_eq!(before, after, "no duplicate log rows");
    }

    #[tokio::test]
    async fn test_get_context_reflects_setup() {
        let engine = test_engine(MemoryStore::new());
        let (game_id, _) = engine.create_game(None, "alice").await.expect("create");

        let context = engine.get_context(&game_id).await.expect("context");
        assert_eq!(context.player_mission, "Convince Livia to open the vault.");
        assert_eq!(context.characters.len(), 1);
        assert_eq!(context.characters[0].name, "Livia");
    }

    #[tokio::test]
    async fn test_game_belongs_to_user() {
        let engine = test_engine(MemoryStore::new());
        let (game_id, _) = engine.create_game(None, "alice").await.expect("create");

        assert!(engine.game_belongs_to_user(&game_id, "alice").expect("check"));
        assert!(!engine.game_belongs_to_user(&game_id, "bob").expect("check"));
    }

    #[tokio::test]
    async fn test_unknown_game_is_not_found() {
        let engine = test_engine(MemoryStore::new());
        let err = engine.get_state("nope").await.unwrap_err();
        assert!(crate::error::is_not_found(&err));
    }

    #[tokio::test]
    async fn test_rehydrate_refuses_actorless_config() {
        let store = MemoryStore::new();
        let game_id = store
            .create_game("Broken", r#"{"title": "Broken", "actors": []}"#, "alice", "scenario")
            .expect("create");
        let engine = test_engine(store);

        let err = engine.resume_game(&game_id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AgoraError>(),
            Some(AgoraError::CannotResume(_))
        ));
    }

    #[tokio::test]
    async fn test_rehydrate_from_legacy_message_log() {
        let store = MemoryStore::new();
        let config = serde_json::to_string(&test_setup()).expect("config");
        let game_id = store
            .create_game("Legacy", &config, "alice", "scenario")
            .expect("create");
        // A legacy record: messages only in the log, snapshot without them.
        store
            .append_message(
                &game_id,
                1,
                "actor_livia",
                "The vault stays shut.",
                r#"{"author": "Livia", "timestamp": "2024-03-01T10:00:00+00:00"}"#,
            )
            .expect("append");
        store
            .save_state(&game_id, r#"{"turn": 1, "metadata": {}, "next_action": "user_input"}"#)
            .expect("save");

        let engine = test_engine(store);
        let info = engine.resume_game(&game_id).expect("resume");
        assert!(!info.loaded_from_memory);

        let state = engine.get_state(&game_id).await.expect("state");
        assert_eq!(state.turn, 1);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].author, "Livia");
        assert_eq!(state.messages[0].turn, 1);
    }

    #[tokio::test]
    async fn test_resume_resident_session_is_cheap() {
        let engine = test_engine(MemoryStore::new());
        let (game_id, _) = engine.create_game(None, "alice").await.expect("create");

        let info = engine.resume_game(&game_id).expect("resume");
        assert!(info.loaded_from_memory);
    }

    #[tokio::test]
    async fn test_status_hides_user_speaker() {
        let engine = test_engine(MemoryStore::new());
        let (game_id, _) = engine.create_game(None, "alice").await.expect("create");

        // After warmup the alternating observer left "none" as the speaker.
        let status = engine.get_status(&game_id).await.expect("status");
        assert!(status.current_speaker.is_empty());
    }
}
