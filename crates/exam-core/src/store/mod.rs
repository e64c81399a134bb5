//! Local paper store.
//!
//! The local store is the source of truth for what the user sees. The
//! reconciler only ever pushes or pulls it as a whole snapshot, so the
//! interface is a plain keyed collection.

pub mod memory;
pub mod sqlite;

use crate::error::Result;
use crate::model::Paper;

pub use memory::MemoryPaperStore;
pub use sqlite::SqlitePaperStore;

/// Keyed collection of papers.
///
/// Implementations must be safe to share across tasks; every method takes
/// `&self` and does its own locking.
pub trait PaperStore: Send + Sync {
    /// Insert a new paper.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::InvalidInput` if a paper with the same id exists.
    fn add(&self, paper: &Paper) -> Result<()>;

    /// Insert or replace a paper by id.
    fn put(&self, paper: &Paper) -> Result<()>;

    /// Remove a paper. Removing a missing id is not an error.
    fn delete(&self, id: &str) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<Paper>>;

    /// Every paper, newest first.
    fn get_all(&self) -> Result<Vec<Paper>>;

    /// Remove every paper.
    fn clear(&self) -> Result<()>;
}

fn sort_newest_first(papers: &mut [Paper]) {
    papers.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
