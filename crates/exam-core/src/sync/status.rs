//! Sync progress as seen by the user.

use std::fmt;

/// Current state of the active namespace's sync.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Nothing has happened yet.
    #[default]
    Idle,
    /// A local change is waiting out the quiet period.
    Pending,
    /// A push is in flight.
    Saving,
    /// The last push or pull succeeded.
    Saved,
    /// The last push or pull failed.
    Failed(String),
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => f.write_str("idle"),
            SyncStatus::Pending => f.write_str("save pending"),
            SyncStatus::Saving => f.write_str("saving"),
            SyncStatus::Saved => f.write_str("saved"),
            SyncStatus::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Which sync step produced a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Push,
    Pull,
    Switch,
}

/// A one-shot, user-visible report of a failed sync step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub namespace: String,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self.kind {
            NoticeKind::Push => "Saving to remote",
            NoticeKind::Pull => "Loading from remote",
            NoticeKind::Switch => "Switching folder",
        };
        write!(f, "{} failed ({}): {}", step, self.namespace, self.message)
    }
}
