//! Agora - narrative role-play session engine
//!
//! This library provides the core functionality of the Agora engine:
//! session orchestration for LLM-driven role-play games, with durable
//! persistence and live-streamed turns.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `state` / `manager`: the conversation ledger (messages, turn counter, metadata)
//! - `director`: turn routing and the single-step executor
//! - `engine`: the session registry, step loops, checkpointing and rehydration
//! - `agents`: actor and observer traits, LLM-backed and scripted implementations
//! - `scenario`: scenario documents and generators
//! - `providers`: chat-completion provider abstraction (DeepSeek bundled)
//! - `persistence`: game records, the storage trait, sled and in-memory backends
//! - `stream`: the worker-to-consumer streaming bridge
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use agora::agents::ScriptedFactory;
//! use agora::config::EngineConfig;
//! use agora::engine::GameEngine;
//! use agora::persistence::MemoryStore;
//! use agora::scenario::{default_scenario, FixedScenarioGenerator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = GameEngine::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(ScriptedFactory::new()),
//!         Arc::new(FixedScenarioGenerator::new(default_scenario())),
//!         EngineConfig::default(),
//!     );
//!     let (game_id, setup) = engine.create_game(None, "player").await?;
//!     println!("playing {}: {}", game_id, setup.title);
//!     let (events, _state, _ended) = engine.player_input(&game_id, "Hello?", false).await?;
//!     println!("{} events", events.len());
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod cli;
pub mod config;
pub mod director;
pub mod engine;
pub mod error;
pub mod manager;
pub mod persistence;
pub mod providers;
pub mod scenario;
pub mod state;
pub mod stream;

// Re-export commonly used types
pub use config::Config;
pub use director::{GameEvent, NextAction};
pub use engine::{GameEngine, GameStatus, ResumeInfo};
pub use error::{AgoraError, Result};
pub use manager::ConversationManager;
pub use scenario::ScenarioSetup;
pub use state::{ConversationState, Message, PLAYER_AUTHOR};
