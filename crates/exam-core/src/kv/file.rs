//! Durable settings backed by a single JSON object file.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::DurableKv;
use crate::error::{ExamError, Result};
use crate::fs::write_private_atomic;

/// A flat `{ "key": "value" }` JSON file.
///
/// Every write rewrites the whole file atomically, owner-readable only.
/// A missing file reads as empty.
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileKv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ExamError::Storage(format!(
                    "Settings file {} is not a JSON object of strings: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(map)?;
        write_private_atomic(&self.path, &json)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<()> {
        let _held = self
            .guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut map = self.load()?;
        if f(&mut map) {
            self.store(&map)?;
        }
        Ok(())
    }
}

impl DurableKv for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|map| map.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{ACTIVE_NAMESPACE, REMOTE_ENDPOINT};
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let kv = FileKv::new(dir.path().join("settings.json"));
        assert_eq!(kv.get(REMOTE_ENDPOINT).unwrap(), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let kv = FileKv::new(&path);
        kv.set(REMOTE_ENDPOINT, "https://kv.example").unwrap();
        kv.set(ACTIVE_NAMESPACE, "exam-papers").unwrap();
        kv.remove(REMOTE_ENDPOINT).unwrap();
        drop(kv);

        let reopened = FileKv::new(&path);
        assert_eq!(reopened.get(REMOTE_ENDPOINT).unwrap(), None);
        assert_eq!(
            reopened.get(ACTIVE_NAMESPACE).unwrap().as_deref(),
            Some("exam-papers")
        );
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let kv = FileKv::new(&path);
        assert!(matches!(
            kv.get(REMOTE_ENDPOINT),
            Err(ExamError::Storage(_))
        ));
    }
}
