//! Namespace (folder) directory.
//!
//! The set of folders is one remote record under [`DIRECTORY_KEY`]:
//! `{ "keys": [...], "aliases": { key: alias } }`. Every mutation reads the
//! whole record, edits it and writes it back. Concurrent editors race with
//! last write wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ExamError, Result};
use crate::remote::RemoteStore;

/// Remote key of the directory record. Never used as a namespace key.
pub const DIRECTORY_KEY: &str = "exam-folders";

/// Key of the namespace created on first run.
pub const DEFAULT_NAMESPACE: &str = "exam-papers";

/// Alias of the namespace created on first run.
pub const DEFAULT_ALIAS: &str = "Default";

/// A folder as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Namespace {
    pub key: String,
    pub alias: String,
}

/// The directory record itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    pub keys: Vec<String>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl Default for Directory {
    fn default() -> Self {
        let mut aliases = BTreeMap::new();
        aliases.insert(DEFAULT_NAMESPACE.to_string(), DEFAULT_ALIAS.to_string());
        Self {
            keys: vec![DEFAULT_NAMESPACE.to_string()],
            aliases,
        }
    }
}

impl Directory {
    pub fn parse(raw: &str) -> Result<Self> {
        let directory: Directory = serde_json::from_str(raw).map_err(|e| {
            ExamError::MalformedRecord(format!("folder directory is unreadable: {}", e))
        })?;
        if directory.keys.is_empty() {
            return Err(ExamError::MalformedRecord(
                "folder directory lists no folders".to_string(),
            ));
        }
        Ok(directory)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Display name of `key`, falling back to the key itself.
    pub fn alias(&self, key: &str) -> String {
        self.aliases
            .get(key)
            .filter(|a| !a.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    pub fn namespaces(&self) -> Vec<Namespace> {
        self.keys
            .iter()
            .map(|key| Namespace {
                key: key.clone(),
                alias: self.alias(key),
            })
            .collect()
    }

    /// Append a folder under a freshly generated key and return the key.
    pub fn add(&mut self, alias: &str) -> String {
        let key = format!("{}-{}", DEFAULT_NAMESPACE, Uuid::new_v4().simple());
        let alias = match alias.trim() {
            "" => format!("Folder {}", self.keys.len() + 1),
            trimmed => trimmed.to_string(),
        };
        self.keys.push(key.clone());
        self.aliases.insert(key.clone(), alias);
        key
    }

    /// Rename a folder. A blank alias resets the display name to the key.
    pub fn rename(&mut self, key: &str, alias: &str) -> Result<()> {
        if !self.contains(key) {
            return Err(ExamError::NotFound(format!("Folder {}", key)));
        }
        let alias = match alias.trim() {
            "" => key.to_string(),
            trimmed => trimmed.to_string(),
        };
        self.aliases.insert(key.to_string(), alias);
        Ok(())
    }

    /// Drop a folder from the record.
    ///
    /// # Errors
    ///
    /// `LastNamespace` if it is the only folder left, `NotFound` if the key
    /// is not listed. The record is untouched on error.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        if !self.contains(key) {
            return Err(ExamError::NotFound(format!("Folder {}", key)));
        }
        if self.keys.len() <= 1 {
            return Err(ExamError::LastNamespace);
        }
        self.keys.retain(|k| k != key);
        self.aliases.remove(key);
        Ok(())
    }

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Read-modify-write access to the remote directory record.
#[derive(Clone)]
pub struct NamespaceDirectory {
    remote: Arc<dyn RemoteStore>,
}

impl NamespaceDirectory {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Fetch the directory record, if one exists.
    pub async fn load(&self, token: &SecretString) -> Result<Option<Directory>> {
        match self.remote.get(DIRECTORY_KEY, token).await? {
            Some(raw) => Directory::parse(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Fetch the directory record, creating the default one if absent.
    pub async fn ensure(&self, token: &SecretString) -> Result<Directory> {
        if let Some(directory) = self.load(token).await? {
            return Ok(directory);
        }

        let directory = Directory::default();
        self.save(&directory, token).await?;
        info!(key = DEFAULT_NAMESPACE, "Created default folder directory");
        Ok(directory)
    }

    pub async fn list(&self, token: &SecretString) -> Result<Vec<Namespace>> {
        Ok(self.ensure(token).await?.namespaces())
    }

    /// Create a folder and return its key.
    pub async fn add(&self, alias: &str, token: &SecretString) -> Result<String> {
        let mut directory = self.ensure(token).await?;
        let key = directory.add(alias);
        self.save(&directory, token).await?;
        debug!(key = %key, "Added folder");
        Ok(key)
    }

    pub async fn rename(&self, key: &str, alias: &str, token: &SecretString) -> Result<()> {
        let mut directory = self.ensure(token).await?;
        directory.rename(key, alias)?;
        self.save(&directory, token).await
    }

    /// Delete a folder's data record, then drop it from the directory.
    pub async fn remove(&self, key: &str, token: &SecretString) -> Result<()> {
        let mut directory = self.ensure(token).await?;
        directory.remove(key)?;
        self.remote.delete(key, token).await?;
        self.save(&directory, token).await?;
        info!(key, "Removed folder");
        Ok(())
    }

    async fn save(&self, directory: &Directory, token: &SecretString) -> Result<()> {
        self.remote
            .put(DIRECTORY_KEY, &directory.to_json()?, token)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;

    fn token() -> SecretString {
        SecretString::from("t".to_string())
    }

    #[test]
    fn test_default_directory() {
        let directory = Directory::default();
        assert_eq!(
            directory.namespaces(),
            vec![Namespace {
                key: DEFAULT_NAMESPACE.to_string(),
                alias: DEFAULT_ALIAS.to_string()
            }]
        );
    }

    #[test]
    fn test_add_generates_distinct_keys() {
        let mut directory = Directory::default();
        let a = directory.add("Biology");
        let b = directory.add("  ");

        assert_ne!(a, b);
        assert!(a.starts_with("exam-papers-"));
        assert_eq!(a.len(), "exam-papers-".len() + 32);
        assert_eq!(directory.alias(&a), "Biology");
        assert_eq!(directory.alias(&b), "Folder 3");
        assert_ne!(a, DIRECTORY_KEY);
    }

    #[test]
    fn test_rename_blank_falls_back_to_key() {
        let mut directory = Directory::default();
        directory.rename(DEFAULT_NAMESPACE, "").unwrap();
        assert_eq!(directory.alias(DEFAULT_NAMESPACE), DEFAULT_NAMESPACE);
        assert!(matches!(
            directory.rename("nope", "x"),
            Err(ExamError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_last_is_refused() {
        let mut directory = Directory::default();
        let before = directory.clone();
        assert!(matches!(
            directory.remove(DEFAULT_NAMESPACE),
            Err(ExamError::LastNamespace)
        ));
        assert_eq!(directory, before);
    }

    #[test]
    fn test_alias_missing_falls_back_to_key() {
        let directory = Directory::parse(r#"{"keys": ["a", "b"], "aliases": {"a": "Alpha"}}"#).unwrap();
        assert_eq!(directory.alias("a"), "Alpha");
        assert_eq!(directory.alias("b"), "b");
    }

    #[test]
    fn test_parse_rejects_bad_records() {
        assert!(matches!(
            Directory::parse("[]"),
            Err(ExamError::MalformedRecord(_))
        ));
        assert!(matches!(
            Directory::parse(r#"{"keys": []}"#),
            Err(ExamError::MalformedRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_bootstraps_once() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let directory = NamespaceDirectory::new(remote.clone());

        let first = directory.ensure(&token()).await.unwrap();
        let second = directory.ensure(&token()).await.unwrap();

        assert_eq!(first, Directory::default());
        assert_eq!(first, second);
        assert_eq!(remote.puts_to(DIRECTORY_KEY).len(), 1);
    }

    #[tokio::test]
    async fn test_remove_deletes_data_then_updates_directory() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let directory = NamespaceDirectory::new(remote.clone());

        let key = directory.add("Physics", &token()).await.unwrap();
        remote.insert(&key, "[]");

        directory.remove(&key, &token()).await.unwrap();

        assert_eq!(remote.value(&key), None);
        assert_eq!(remote.deletes(), vec![key.clone()]);
        let listed = directory.list(&token()).await.unwrap();
        assert!(listed.iter().all(|ns| ns.key != key));
    }

    #[tokio::test]
    async fn test_remove_sole_namespace_leaves_remote_unchanged() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let directory = NamespaceDirectory::new(remote.clone());
        directory.ensure(&token()).await.unwrap();
        let before = remote.value(DIRECTORY_KEY);

        let result = directory.remove(DEFAULT_NAMESPACE, &token()).await;

        assert!(matches!(result, Err(ExamError::LastNamespace)));
        assert_eq!(remote.value(DIRECTORY_KEY), before);
        assert!(remote.deletes().is_empty());
    }
}
