//! # Exam Core
//!
//! Core library for exam, a self-graded question paper tool with
//! encrypted remote sync.
//!
//! This crate provides the data model, local storage, credential handling
//! and sync logic independent of the CLI interface.
//!
//! ## Architecture
//!
//! - **model**: papers, questions, grading, JSON import/export
//! - **store**: local paper store (SQLite, in-memory)
//! - **kv**: durable settings and volatile session capabilities
//! - **crypto**: password envelope cipher
//! - **vault**: remote credential lifecycle (unset/locked/unlocked)
//! - **remote**: bearer-authenticated key-value client
//! - **namespace**: folder directory stored remotely
//! - **sync**: debounced push, pull-and-merge, folder switching

pub mod crypto;
pub mod error;
pub mod fs;
pub mod kv;
pub mod model;
pub mod namespace;
pub mod remote;
pub mod store;
pub mod sync;
pub mod vault;

pub use error::{ExamError, Result};
pub use model::{Paper, Question};
pub use store::PaperStore;
pub use sync::SyncReconciler;
pub use vault::{CredentialVault, VaultState};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
