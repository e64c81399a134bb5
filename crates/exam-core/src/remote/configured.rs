//! A [`RemoteStore`] whose endpoint lives in the settings store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;

use super::{HttpRemoteStore, RemoteStore};
use crate::error::{ExamError, Result};
use crate::kv::{DurableKv, REMOTE_ENDPOINT};

/// Resolves `remote.endpoint` on every call, so a changed endpoint takes
/// effect without rebuilding the reconciler.
pub struct ConfiguredRemoteStore {
    settings: Arc<dyn DurableKv>,
    client: Mutex<Option<HttpRemoteStore>>,
}

impl ConfiguredRemoteStore {
    pub fn new(settings: Arc<dyn DurableKv>) -> Self {
        Self {
            settings,
            client: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<HttpRemoteStore> {
        let endpoint = self
            .settings
            .get(REMOTE_ENDPOINT)?
            .ok_or(ExamError::NotConfigured)?;

        let mut cached = self
            .client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = cached.as_ref() {
            if client.base_url() == endpoint.trim_end_matches('/') {
                return Ok(client.clone());
            }
        }
        let client = HttpRemoteStore::new(endpoint)?;
        *cached = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl RemoteStore for ConfiguredRemoteStore {
    async fn get(&self, key: &str, token: &SecretString) -> Result<Option<String>> {
        self.client()?.get(key, token).await
    }

    async fn put(&self, key: &str, value: &str, token: &SecretString) -> Result<()> {
        self.client()?.put(key, value, token).await
    }

    async fn delete(&self, key: &str, token: &SecretString) -> Result<()> {
        self.client()?.delete(key, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    #[tokio::test]
    async fn test_missing_endpoint_is_not_configured() {
        let store = ConfiguredRemoteStore::new(Arc::new(MemoryKv::new()));
        let token = SecretString::from("t".to_string());

        let result = store.get("exam-papers", &token).await;

        assert!(matches!(result, Err(ExamError::NotConfigured)));
    }

    #[test]
    fn test_client_follows_endpoint_changes() {
        let settings = Arc::new(MemoryKv::new());
        let store = ConfiguredRemoteStore::new(settings.clone());

        DurableKv::set(settings.as_ref(), REMOTE_ENDPOINT, "https://a.example.dev").unwrap();
        assert_eq!(store.client().unwrap().base_url(), "https://a.example.dev");

        DurableKv::set(settings.as_ref(), REMOTE_ENDPOINT, "https://b.example.dev").unwrap();
        assert_eq!(store.client().unwrap().base_url(), "https://b.example.dev");
    }
}
