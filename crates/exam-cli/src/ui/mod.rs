//! UI primitives for the exam CLI.
//!
//! - **Context**: environment detection (TTY, width, color, unicode) and
//!   output mode
//! - **Theme**: badges and the color palette
//! - **Render**: tables, headers, key/value lines, sync status
//! - **Progress**: spinner around remote calls

mod context;
pub mod progress;
pub mod render;
pub mod theme;

pub use context::UiContext;
pub use progress::Spinner;
pub use render::{badge, header, hint, kv, print, table, Column};
pub use theme::Badge;
