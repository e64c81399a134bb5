//! Application-level utilities for the exam CLI.
//!
//! This module provides:
//! - Config and paper resolution
//! - Wiring of stores, vault and reconciler for one invocation
//! - Password prompts and unlock with retry

mod context;
mod prompt;
mod resolver;
mod unlock;

pub use context::{App, AppContext};
pub use prompt::{confirm, prompt_line, prompt_new_password, prompt_password, read_input};
pub use resolver::{question_index, resolve_config_path, resolve_paper};
pub use unlock::ensure_unlocked;
