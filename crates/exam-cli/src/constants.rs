//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// Resource not found (paper, question, folder).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input or arguments.
    pub const INVALID_INPUT: i32 = 4;

    /// Authentication failed (wrong password, rejected or missing token).
    pub const AUTH_FAILED: i32 = 5;

    /// The remote store failed or could not be reached.
    pub const REMOTE_FAILED: i32 = 6;
}

/// Environment variables read by the CLI.
pub mod env {
    pub const CONFIG: &str = "EXAM_CONFIG";
    pub const DATABASE: &str = "EXAM_DB";
    pub const LOG: &str = "EXAM_LOG";
    pub const TOKEN: &str = "EXAM_TOKEN";
    pub const UNLOCK_PASSWORD: &str = "EXAM_UNLOCK_PASSWORD";
    pub const BACKUP_PASSWORD: &str = "EXAM_BACKUP_PASSWORD";
}

/// Password attempts before an interactive unlock gives up.
pub const MAX_UNLOCK_ATTEMPTS: usize = 3;

/// Default session token lifetime in the cache daemon.
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 3600;
