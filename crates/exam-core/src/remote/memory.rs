//! In-process remote store for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Semaphore;

use super::RemoteStore;
use crate::error::{ExamError, Result};

/// A failure to inject into the next matching call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Network,
    Unauthorized,
    Status(u16),
}

impl Failure {
    fn into_error(self) -> ExamError {
        match self {
            Failure::Network => ExamError::Network("simulated connection failure".to_string()),
            Failure::Unauthorized => ExamError::Unauthorized,
            Failure::Status(status) => ExamError::Remote {
                status,
                message: "simulated failure".to_string(),
            },
        }
    }
}

#[derive(Debug, Default)]
struct State {
    values: HashMap<String, String>,
    puts: Vec<(String, String)>,
    gets: Vec<String>,
    deletes: Vec<String>,
    get_failures: VecDeque<Failure>,
    key_get_failures: HashMap<String, Failure>,
    put_failures: VecDeque<Failure>,
    put_gate: Option<Arc<Semaphore>>,
}

/// Map-backed [`RemoteStore`] that records every call.
///
/// If constructed with [`MemoryRemoteStore::with_token`], any other bearer
/// token is rejected with `Unauthorized`.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    token: Option<String>,
    state: Mutex<State>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            state: Mutex::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn authorize(&self, token: &SecretString) -> Result<()> {
        match &self.token {
            Some(expected) if expected != token.expose_secret() => Err(ExamError::Unauthorized),
            _ => Ok(()),
        }
    }

    /// Seed a value without recording a call.
    pub fn insert(&self, key: &str, value: &str) {
        self.state()
            .values
            .insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.state().values.get(key).cloned()
    }

    /// Every successful put, in order, as `(key, value)`.
    pub fn puts(&self) -> Vec<(String, String)> {
        self.state().puts.clone()
    }

    /// Successful puts to one key.
    pub fn puts_to(&self, key: &str) -> Vec<String> {
        self.state()
            .puts
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Keys read so far, in order, including failed reads.
    pub fn gets(&self) -> Vec<String> {
        self.state().gets.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state().deletes.clone()
    }

    pub fn fail_next_get(&self, failure: Failure) {
        self.state().get_failures.push_back(failure);
    }

    /// Fail the next read of `key` only.
    pub fn fail_next_get_of(&self, key: &str, failure: Failure) {
        self.state()
            .key_get_failures
            .insert(key.to_string(), failure);
    }

    pub fn fail_next_put(&self, failure: Failure) {
        self.state().put_failures.push_back(failure);
    }

    /// Hold every put in flight until [`resume_puts`](Self::resume_puts).
    pub fn pause_puts(&self) {
        self.state().put_gate = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn resume_puts(&self) {
        if let Some(gate) = self.state().put_gate.take() {
            gate.close();
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, key: &str, token: &SecretString) -> Result<Option<String>> {
        let mut state = self.state();
        state.gets.push(key.to_string());
        if let Some(failure) = state.get_failures.pop_front() {
            return Err(failure.into_error());
        }
        if let Some(failure) = state.key_get_failures.remove(key) {
            return Err(failure.into_error());
        }
        drop(state);
        self.authorize(token)?;
        Ok(self.state().values.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str, token: &SecretString) -> Result<()> {
        let gate = self.state().put_gate.clone();
        if let Some(gate) = gate {
            // Closing the semaphore is the release signal.
            let _ = gate.acquire().await;
        }

        let mut state = self.state();
        if let Some(failure) = state.put_failures.pop_front() {
            return Err(failure.into_error());
        }
        drop(state);
        self.authorize(token)?;

        let mut state = self.state();
        state.values.insert(key.to_string(), value.to_string());
        state.puts.push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str, token: &SecretString) -> Result<()> {
        self.authorize(token)?;
        let mut state = self.state();
        state.values.remove(key);
        state.deletes.push(key.to_string());
        Ok(())
    }
}
