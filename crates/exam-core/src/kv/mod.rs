//! String key-value capabilities.
//!
//! The vault and the reconciler never touch ambient storage. They are handed
//! a [`DurableKv`] for settings that survive restarts and a [`VolatileKv`]
//! for the session token, which must never reach disk.

pub mod file;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::Result;

pub use file::FileKv;

/// Settings key holding the remote endpoint URL.
pub const REMOTE_ENDPOINT: &str = "remote.endpoint";

/// Settings key holding the sealed token envelope.
pub const REMOTE_ENCRYPTED_TOKEN: &str = "remote.encrypted_token";

/// Settings key holding the active namespace key.
pub const ACTIVE_NAMESPACE: &str = "sync.active_namespace";

/// Session key holding the plaintext bearer token.
pub const SESSION_TOKEN: &str = "remote.session_token";

/// Persistent string settings.
pub trait DurableKv: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Session-scoped string storage. Contents vanish when the session ends.
pub trait VolatileKv: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory map usable as either capability.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    fn erase(&self, key: &str) {
        self.lock().remove(key);
    }
}

impl DurableKv for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.erase(key);
        Ok(())
    }
}

impl VolatileKv for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.erase(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_kv_set_get_remove() {
        let kv = MemoryKv::new();
        DurableKv::set(&kv, REMOTE_ENDPOINT, "https://kv.example").unwrap();
        assert_eq!(
            DurableKv::get(&kv, REMOTE_ENDPOINT).unwrap().as_deref(),
            Some("https://kv.example")
        );

        DurableKv::remove(&kv, REMOTE_ENDPOINT).unwrap();
        assert_eq!(DurableKv::get(&kv, REMOTE_ENDPOINT).unwrap(), None);
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let kv = MemoryKv::new();
        assert!(VolatileKv::remove(&kv, SESSION_TOKEN).is_ok());
    }
}
