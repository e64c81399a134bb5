//! Local/remote synchronisation.
//!
//! - **reconciler**: debounced auto-push, save-now, pull-and-merge,
//!   namespace switching
//! - **merge**: snapshot merge rules
//! - **timer**: cancellable quiet-period timers
//! - **status**: user-visible progress and failure notices

pub mod merge;
pub mod reconciler;
pub mod status;
pub mod timer;

pub use merge::{merge_snapshot, MergeReport};
pub use reconciler::{PushOutcome, SyncOptions, SyncReconciler, DEFAULT_QUIET_PERIOD};
pub use status::{Notice, NoticeKind, SyncStatus};
pub use timer::{Scheduler, Task, TimerHandle, TokioScheduler};
