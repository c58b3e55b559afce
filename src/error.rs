//! Error types for the Autolab client
//!
//! This module defines all error types used throughout the client,
//! using `thiserror` for ergonomic error handling. Callers that need to
//! react to a specific failure (for example an expired authorization) use
//! `anyhow::Error::downcast_ref::<AutolabError>()` on the propagated error.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for Autolab client operations
#[derive(Error, Debug)]
pub enum AutolabError {
    /// The HTTP request could not complete (connection refused, DNS, TLS, ...)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A well-formed response was missing fields required for its endpoint
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The access token was rejected and refreshing it did not help
    #[error("The provided access token is invalid and the refresh operation failed")]
    InvalidToken,

    /// A download target or upload source could not be opened, read or written
    #[error("File system error at {}: {source}", path.display())]
    FileSystem {
        /// Path that was being accessed
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The service answered with a structured `{ "error": ... }` body
    #[error("{message} (HTTP {status})")]
    Api {
        /// HTTP status code of the response
        status: u16,
        /// Value of the `error` field
        message: String,
    },

    /// An operation was invoked in a state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The user denied the device authorization or it could not complete
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// No tokens are stored on this machine
    #[error("No user set up on this client yet")]
    NotSetUp,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid command-line usage detected after argument parsing
    #[error("{0}")]
    Usage(String),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AutolabError {
    /// Wraps an I/O failure on `path` as a [`AutolabError::FileSystem`].
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for Autolab operations
///
/// Uses `anyhow::Error` so that context can be attached while the
/// underlying [`AutolabError`] stays available through `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;

/// Returns the [`AutolabError`] carried by `err`, if any.
pub fn kind_of(err: &anyhow::Error) -> Option<&AutolabError> {
    err.downcast_ref::<AutolabError>()
}

/// Returns `true` when `err` is the terminal invalid-token condition.
pub fn is_invalid_token(err: &anyhow::Error) -> bool {
    matches!(kind_of(err), Some(AutolabError::InvalidToken))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let error = AutolabError::Protocol("missing device_code".to_string());
        assert_eq!(error.to_string(), "Protocol error: missing device_code");
    }

    #[test]
    fn test_api_error_display() {
        let error = AutolabError::Api {
            status: 404,
            message: "Assessment not found".to_string(),
        };
        assert_eq!(error.to_string(), "Assessment not found (HTTP 404)");
    }

    #[test]
    fn test_file_system_error_display_includes_path() {
        let error = AutolabError::file_system(
            "/tmp/handout.pdf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let s = error.to_string();
        assert!(s.contains("/tmp/handout.pdf"));
        assert!(s.contains("denied"));
    }

    #[test]
    fn test_is_invalid_token_through_anyhow() {
        let err: anyhow::Error = AutolabError::InvalidToken.into();
        assert!(is_invalid_token(&err));

        let err: anyhow::Error = AutolabError::Protocol("x".to_string()).into();
        assert!(!is_invalid_token(&err));
    }

    #[test]
    fn test_kind_survives_context() {
        let err = anyhow::Error::from(AutolabError::NotSetUp).context("loading tokens");
        assert!(matches!(kind_of(&err), Some(AutolabError::NotSetUp)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: AutolabError = io_error.into();
        assert!(matches!(error, AutolabError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: AutolabError = json_error.into();
        assert!(matches!(error, AutolabError::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AutolabError>();
    }
}
