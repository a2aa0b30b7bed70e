//! Command-line interface definition for Agora
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for playing a game and listing saved games.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Agora - narrative role-play session engine
///
/// Play LLM-driven role-play scenarios against NPC characters, with
/// durable sessions that survive restarts.
#[derive(Parser, Debug, Clone)]
#[command(name = "agora")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/agora.yaml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Player name used as the game owner
    #[arg(short, long, default_value = "player", env = "AGORA_USER")]
    pub user: String,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Agora
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a new game, or resume a saved one
    Play {
        /// Theme hint for the scenario generator
        #[arg(short, long)]
        theme: Option<String>,

        /// Resume a saved game by id instead of creating a new one
        #[arg(short, long)]
        resume: Option<String>,

        /// Override the configured turn limit
        #[arg(long)]
        max_turns: Option<u32>,
    },

    /// List saved games
    List,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
