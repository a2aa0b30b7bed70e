//! Configuration management for Agora
//!
//! Loads a YAML configuration file with provider, engine, and storage
//! sections. Every field has a sensible default so a missing file or a
//! partial file still yields a working configuration.

use crate::error::{AgoraError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the games database directory
pub const GAMES_DIR_ENV: &str = "AGORA_GAMES_DIR";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// LLM provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Engine defaults for new games
    #[serde(default)]
    pub engine: EngineConfig,
    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// LLM provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the chat-completions API
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_api_base() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Engine defaults applied to newly created games
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Player turns before the session stops advancing
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Consecutive non-player messages before the player is forced to act;
    /// 0 disables the cap
    #[serde(default = "default_max_messages_before_user")]
    pub max_messages_before_user: u32,
    /// NPC count requested from the scenario generator
    #[serde(default = "default_actor_count")]
    pub actor_count: usize,
}

fn default_max_turns() -> u32 {
    10
}

fn default_max_messages_before_user() -> u32 {
    3
}

fn default_actor_count() -> usize {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_messages_before_user: default_max_messages_before_user(),
            actor_count: default_actor_count(),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the games database; when unset, resolution falls
    /// back to the `AGORA_GAMES_DIR` environment variable, then to the
    /// platform data directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolves the games database path
    pub fn games_db_path(&self) -> Result<PathBuf> {
        let dir = if let Some(dir) = &self.data_dir {
            dir.clone()
        } else if let Ok(dir) = std::env::var(GAMES_DIR_ENV) {
            PathBuf::from(dir)
        } else {
            let dirs = ProjectDirs::from("", "", "agora").ok_or_else(|| {
                AgoraError::Config("could not determine a data directory".to_string())
            })?;
            dirs.data_dir().to_path_buf()
        };
        Ok(dir.join("games.db"))
    }
}

impl Config {
    /// Loads configuration from a YAML file
    ///
    /// A missing file yields the default configuration; a present but
    /// malformed file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed,
    /// or when the parsed configuration fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(AgoraError::Io)?;
        let config: Self = serde_yaml::from_str(&contents).map_err(AgoraError::Yaml)?;
        config.validate()?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns [`AgoraError::Config`] when a field is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.provider.api_base.trim().is_empty() {
            return Err(AgoraError::Config("provider.api_base must not be empty".to_string()).into());
        }
        if self.provider.model.trim().is_empty() {
            return Err(AgoraError::Config("provider.model must not be empty".to_string()).into());
        }
        if self.engine.max_turns == 0 {
            return Err(AgoraError::Config("engine.max_turns must be at least 1".to_string()).into());
        }
        if self.engine.actor_count == 0 {
            return Err(
                AgoraError::Config("engine.actor_count must be at least 1".to_string()).into(),
            );
        }
        Ok(())
    }
}
