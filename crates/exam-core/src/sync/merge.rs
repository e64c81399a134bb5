//! Pull-and-merge of a remote snapshot into the local store.
//!
//! Remote papers overwrite local papers with the same id and new ids are
//! inserted. Nothing is ever deleted: a paper removed on another device
//! comes back on the next pull. There are no tombstones to tell a deletion
//! from a paper that was never pushed.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ExamError, Result};
use crate::model::Paper;
use crate::store::PaperStore;

/// What a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Remote entries that failed shape validation.
    pub skipped: usize,
}

impl MergeReport {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Merge the JSON array `raw` into `store`.
///
/// # Errors
///
/// `MalformedRecord` if `raw` is not a JSON array at all. Individual bad
/// entries are skipped and counted instead.
pub fn merge_snapshot(store: &dyn PaperStore, raw: &str) -> Result<MergeReport> {
    let entries = parse_snapshot(raw)?;
    merge_entries(store, &entries)
}

/// Check that `raw` is a JSON array and return its entries unvalidated.
pub fn parse_snapshot(raw: &str) -> Result<Vec<Value>> {
    let snapshot: Value = serde_json::from_str(raw)
        .map_err(|e| ExamError::MalformedRecord(format!("snapshot is not JSON: {}", e)))?;
    match snapshot {
        Value::Array(entries) => Ok(entries),
        _ => Err(ExamError::MalformedRecord(
            "snapshot is not a list".to_string(),
        )),
    }
}

/// Merge already parsed snapshot entries into `store`.
pub fn merge_entries(store: &dyn PaperStore, entries: &[Value]) -> Result<MergeReport> {
    let mut report = MergeReport::default();
    for (index, entry) in entries.iter().enumerate() {
        let paper = match Paper::from_remote(entry) {
            Ok(paper) => paper,
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed remote paper");
                report.skipped += 1;
                continue;
            }
        };

        match store.get(&paper.id)? {
            Some(local) if local == paper => report.unchanged += 1,
            Some(_) => {
                store.put(&paper)?;
                report.updated += 1;
            }
            None => {
                store.put(&paper)?;
                report.inserted += 1;
            }
        }
    }

    debug!(?report, "Merged remote snapshot");
    Ok(report)
}
