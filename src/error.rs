//! Error types for Agora
//!
//! This module defines all error types used throughout the engine,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Agora operations
///
/// This enum encompasses all possible errors that can occur during
/// scenario generation, session orchestration, agent calls, and
/// persistence operations.
#[derive(Error, Debug)]
pub enum AgoraError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Scenario generation or parsing errors
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// Provider-related errors (LLM API calls, authentication, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Actor or observer agent errors
    #[error("Agent error: {0}")]
    Agent(String),

    /// Unknown game id on a per-game operation
    #[error("Game not found: {0}")]
    GameNotFound(String),

    /// Invalid scenario setup (bad or empty actor list)
    #[error("Invalid setup: {0}")]
    InvalidSetup(String),

    /// Malformed persisted record encountered during rehydration
    #[error("Session cannot be resumed: {0}")]
    CannotResume(String),

    /// Game persistence errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Agora operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Returns true if the error chain contains a [`AgoraError::GameNotFound`]
///
/// Callers that map engine errors to user-visible failures use this to
/// distinguish "unknown game" from internal faults.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<AgoraError>(), Some(AgoraError::GameNotFound(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = AgoraError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_game_not_found_display() {
        let error = AgoraError::GameNotFound("abc123".to_string());
        assert_eq!(error.to_string(), "Game not found: abc123");
    }

    #[test]
    fn test_invalid_setup_display() {
        let error = AgoraError::InvalidSetup("actors list is empty".to_string());
        assert_eq!(error.to_string(), "Invalid setup: actors list is empty");
    }

    #[test]
    fn test_cannot_resume_display() {
        let error = AgoraError::CannotResume("no valid actors".to_string());
        assert_eq!(
            error.to_string(),
            "Session cannot be resumed: no valid actors"
        );
    }

    #[test]
    fn test_storage_error_display() {
        let error = AgoraError::Storage("database connection failed".to_string());
        assert_eq!(error.to_string(), "Storage error: database connection failed");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: AgoraError = io_error.into();
        assert!(matches!(error, AgoraError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let error: AgoraError = json_error.into();
        assert!(matches!(error, AgoraError::Serialization(_)));
    }

    #[test]
    fn test_is_not_found() {
        let err: anyhow::Error = AgoraError::GameNotFound("x".to_string()).into();
        assert!(is_not_found(&err));

        let err: anyhow::Error = AgoraError::Storage("x".to_string()).into();
        assert!(!is_not_found(&err));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AgoraError>();
    }
}
