//! CLI error types for structured error handling.
//!
//! This module provides typed errors that map to specific exit codes,
//! enabling consistent error handling across the CLI.

use std::fmt;

use exam_core::ExamError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (paper, question, folder)
    NotFound { message: String, hint: String },

    /// Authentication failed (wrong password, token rejected or missing)
    AuthFailed {
        message: String,
        hint: Option<String>,
    },

    /// Invalid user input
    InvalidInput(String),

    /// The remote store failed
    Remote(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } => {
                write!(f, "{}\n{}", message, hint)
            }
            CliError::AuthFailed { message, hint } => {
                if let Some(h) = hint {
                    write!(f, "{}\n{}", message, h)
                } else {
                    write!(f, "{}", message)
                }
            }
            CliError::InvalidInput(message) | CliError::Remote(message) => {
                write!(f, "{}", message)
            }
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an AuthFailed error with message.
    pub fn auth_failed(message: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: None,
        }
    }

    /// Create an AuthFailed error with message and hint.
    pub fn auth_failed_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::AuthFailed { .. } => exit_codes::AUTH_FAILED,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
            CliError::Remote(_) => exit_codes::REMOTE_FAILED,
        }
    }
}

impl From<ExamError> for CliError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::NotFound(what) => CliError::not_found(
                format!("{} not found", what),
                "Run `exam paper list` or `exam ns list` to see what exists.",
            ),
            ExamError::NotConfigured => CliError::auth_failed_with_hint(
                err.to_string(),
                "Run: exam remote configure <endpoint>",
            ),
            ExamError::Locked => {
                CliError::auth_failed_with_hint(err.to_string(), "Run: exam remote unlock")
            }
            ExamError::Unauthorized => CliError::auth_failed_with_hint(
                err.to_string(),
                "Check the token with `exam remote test`, or reconfigure it.",
            ),
            ExamError::Decryption => CliError::auth_failed("Incorrect password."),
            ExamError::Remote { .. } | ExamError::Network(_) => CliError::Remote(err.to_string()),
            ExamError::InvalidInput(_) | ExamError::LastNamespace | ExamError::MalformedRecord(_) => {
                CliError::InvalidInput(err.to_string())
            }
            other => CliError::InvalidInput(other.to_string()),
        }
    }
}

/// Exit code for any error that reaches `main`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    match err.downcast_ref::<ExamError>() {
        Some(ExamError::NotFound(_)) => exit_codes::NOT_FOUND,
        Some(
            ExamError::InvalidInput(_) | ExamError::LastNamespace | ExamError::MalformedRecord(_),
        ) => exit_codes::INVALID_INPUT,
        Some(
            ExamError::Decryption
            | ExamError::Unauthorized
            | ExamError::Locked
            | ExamError::NotConfigured,
        ) => exit_codes::AUTH_FAILED,
        Some(ExamError::Remote { .. } | ExamError::Network(_)) => exit_codes::REMOTE_FAILED,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exam_errors_map_to_exit_codes() {
        let cases = [
            (ExamError::NotFound("Paper x".into()), exit_codes::NOT_FOUND),
            (ExamError::LastNamespace, exit_codes::INVALID_INPUT),
            (ExamError::Decryption, exit_codes::AUTH_FAILED),
            (ExamError::Locked, exit_codes::AUTH_FAILED),
            (ExamError::Network("refused".into()), exit_codes::REMOTE_FAILED),
            (ExamError::Storage("disk".into()), 1),
        ];
        for (err, code) in cases {
            let label = err.to_string();
            assert_eq!(exit_code_for(&anyhow::Error::new(err)), code, "{}", label);
        }
    }

    #[test]
    fn test_converted_errors_keep_their_code() {
        for err in [
            ExamError::NotFound("Folder f".into()),
            ExamError::Unauthorized,
            ExamError::Remote {
                status: 500,
                message: "boom".into(),
            },
        ] {
            let direct = exit_code_for(&anyhow::Error::new(clone_for_test(&err)));
            let converted = CliError::from(err).exit_code();
            assert_eq!(direct, converted);
        }
    }

    fn clone_for_test(err: &ExamError) -> ExamError {
        match err {
            ExamError::NotFound(m) => ExamError::NotFound(m.clone()),
            ExamError::Unauthorized => ExamError::Unauthorized,
            ExamError::Remote { status, message } => ExamError::Remote {
                status: *status,
                message: message.clone(),
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_found_display_includes_hint() {
        let err = CliError::not_found("Paper abc not found", "Run: exam paper list");
        assert_eq!(err.to_string(), "Paper abc not found\nRun: exam paper list");
    }
}
