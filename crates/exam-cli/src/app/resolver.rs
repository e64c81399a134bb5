//! Path and paper resolution.

use std::path::PathBuf;

use exam_core::{Paper, PaperStore};

use crate::cli::Cli;
use crate::config::default_config_path;
use crate::errors::CliError;

/// Resolve the config file path: `--config` / `EXAM_CONFIG`, then the XDG default.
pub fn resolve_config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    if let Some(value) = cli.config.as_deref() {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Find a paper by full id or unique id prefix.
pub fn resolve_paper(store: &dyn PaperStore, query: &str) -> anyhow::Result<Paper> {
    let query = query.trim();
    if let Some(paper) = store.get(query)? {
        return Ok(paper);
    }

    let mut matches: Vec<Paper> = store
        .get_all()?
        .into_iter()
        .filter(|p| !query.is_empty() && p.id.starts_with(query))
        .collect();
    match matches.len() {
        0 => Err(CliError::not_found(
            format!("Paper {} not found", query),
            "Run: exam paper list",
        )
        .into()),
        1 => Ok(matches.remove(0)),
        n => Err(CliError::invalid_input(format!(
            "Paper id prefix {} matches {} papers; use more characters",
            query, n
        ))
        .into()),
    }
}

/// Turn a 1-based question number into an index.
pub fn question_index(number: usize) -> anyhow::Result<usize> {
    number
        .checked_sub(1)
        .ok_or_else(|| CliError::invalid_input("Questions are numbered from 1").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use exam_core::store::MemoryPaperStore;

    fn paper_with_id(id: &str) -> Paper {
        let mut paper = Paper::new("Quiz", Utc::now()).unwrap();
        paper.id = id.to_string();
        paper
    }

    #[test]
    fn test_resolve_by_id_and_prefix() {
        let store = MemoryPaperStore::new();
        store.add(&paper_with_id("abc-111")).unwrap();
        store.add(&paper_with_id("abd-222")).unwrap();

        assert_eq!(resolve_paper(&store, "abc-111").unwrap().id, "abc-111");
        assert_eq!(resolve_paper(&store, "abd").unwrap().id, "abd-222");
    }

    #[test]
    fn test_resolve_ambiguous_and_missing() {
        let store = MemoryPaperStore::new();
        store.add(&paper_with_id("abc-111")).unwrap();
        store.add(&paper_with_id("abd-222")).unwrap();

        let ambiguous = resolve_paper(&store, "ab").unwrap_err();
        assert!(matches!(
            ambiguous.downcast_ref::<CliError>(),
            Some(CliError::InvalidInput(_))
        ));

        let missing = resolve_paper(&store, "zzz").unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<CliError>(),
            Some(CliError::NotFound { .. })
        ));
    }

    #[test]
    fn test_question_numbers_start_at_one() {
        assert_eq!(question_index(1).unwrap(), 0);
        assert!(question_index(0).is_err());
    }
}
