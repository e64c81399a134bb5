//! In-memory paper store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{sort_newest_first, PaperStore};
use crate::error::{ExamError, Result};
use crate::model::Paper;

#[derive(Debug, Default)]
pub struct MemoryPaperStore {
    papers: Mutex<HashMap<String, Paper>>,
}

impl MemoryPaperStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Paper>>> {
        self.papers
            .lock()
            .map_err(|_| ExamError::Storage("Paper store lock poisoned".to_string()))
    }
}

impl PaperStore for MemoryPaperStore {
    fn add(&self, paper: &Paper) -> Result<()> {
        let mut papers = self.lock()?;
        if papers.contains_key(&paper.id) {
            return Err(ExamError::InvalidInput(format!(
                "Paper {} already exists",
                paper.id
            )));
        }
        papers.insert(paper.id.clone(), paper.clone());
        Ok(())
    }

    fn put(&self, paper: &Paper) -> Result<()> {
        self.lock()?.insert(paper.id.clone(), paper.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.lock()?.remove(id);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Paper>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn get_all(&self) -> Result<Vec<Paper>> {
        let mut all: Vec<Paper> = self.lock()?.values().cloned().collect();
        sort_newest_first(&mut all);
        Ok(all)
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}
