//! Error types for exam core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-friendly messages and exit codes.

use thiserror::Error;

/// Result type alias for exam operations.
pub type Result<T> = std::result::Result<T, ExamError>;

/// Core error type for exam operations.
#[derive(Debug, Error)]
pub enum ExamError {
    /// Wrong password or corrupt envelope. Never says which.
    #[error("Decryption failed: wrong password or corrupt data")]
    Decryption,

    /// The remote store rejected (or never received) the bearer token
    #[error("Remote store rejected the access token")]
    Unauthorized,

    /// The remote store was reachable but answered with a failure status
    #[error("Remote store error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    /// The remote store could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// Attempted to remove the only remaining namespace
    #[error("Cannot remove the last remaining folder")]
    LastNamespace,

    /// A remote record failed shape validation
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A saved credential exists but has not been unlocked this session
    #[error("Remote access is locked; unlock it with your password first")]
    Locked,

    /// No remote credential has been configured at all
    #[error("Remote sync is not configured")]
    NotConfigured,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Generic error (fallback)
    #[error("{0}")]
    Other(String),
}

impl ExamError {
    /// Whether this error came from talking to the remote store.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ExamError::Unauthorized | ExamError::Remote { .. } | ExamError::Network(_)
        )
    }

    /// Whether the user has to do something (unlock, fix a password) before retrying.
    pub fn needs_user_action(&self) -> bool {
        matches!(
            self,
            ExamError::Decryption
                | ExamError::LastNamespace
                | ExamError::Locked
                | ExamError::NotConfigured
                | ExamError::Unauthorized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decryption_message_is_uniform() {
        let msg = ExamError::Decryption.to_string();
        assert!(msg.contains("wrong password or corrupt data"));
    }

    #[test]
    fn test_remote_classification() {
        assert!(ExamError::Unauthorized.is_remote());
        assert!(ExamError::Network("refused".to_string()).is_remote());
        assert!(ExamError::Remote {
            status: 500,
            message: "boom".to_string()
        }
        .is_remote());
        assert!(!ExamError::LastNamespace.is_remote());
    }

    #[test]
    fn test_user_action_classification() {
        assert!(ExamError::Locked.needs_user_action());
        assert!(ExamError::LastNamespace.needs_user_action());
        assert!(!ExamError::Network("down".to_string()).needs_user_action());
    }
}
