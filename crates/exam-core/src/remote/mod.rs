//! Bearer-authenticated key-value client.
//!
//! The remote side is a dumb store addressed as `{endpoint}/{key}`. Values
//! are opaque strings here; callers do their own JSON. There is no retry
//! policy at this layer.

pub mod configured;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::{ExamError, Result};

pub use configured::ConfiguredRemoteStore;
pub use memory::{Failure, MemoryRemoteStore};

/// Request timeout for a single remote call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote key-value store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the value stored under `key`, or `None` if nothing is stored.
    async fn get(&self, key: &str, token: &SecretString) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &str, token: &SecretString) -> Result<()>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str, token: &SecretString) -> Result<()>;
}

/// Normalise a user-entered endpoint to an https base URL.
///
/// `http://` is upgraded, a missing scheme gets `https://`, and trailing
/// slashes are dropped.
pub fn normalize_endpoint(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ExamError::InvalidInput(
            "Remote endpoint cannot be empty".to_string(),
        ));
    }

    let rest = if let Some(rest) = strip_scheme(trimmed, "https://") {
        rest
    } else if let Some(rest) = strip_scheme(trimmed, "http://") {
        rest
    } else if trimmed.contains("://") {
        return Err(ExamError::InvalidInput(format!(
            "Unsupported endpoint scheme: {}",
            trimmed
        )));
    } else {
        trimmed
    };

    let host = rest.trim_end_matches('/');
    if host.is_empty() {
        return Err(ExamError::InvalidInput(
            "Remote endpoint has no host".to_string(),
        ));
    }
    Ok(format!("https://{}", host))
}

fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let prefix = value.get(..scheme.len())?;
    if prefix.eq_ignore_ascii_case(scheme) {
        value.get(scheme.len()..)
    } else {
        None
    }
}

/// Map a non-success status to an error.
pub fn status_error(status: u16, body: &str) -> ExamError {
    match status {
        401 => ExamError::Unauthorized,
        _ => {
            let message = body.trim();
            ExamError::Remote {
                status,
                message: if message.is_empty() {
                    StatusCode::from_u16(status)
                        .ok()
                        .and_then(|s| s.canonical_reason())
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    message.chars().take(200).collect()
                },
            }
        }
    }
}

/// [`RemoteStore`] over HTTP(S) with reqwest.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
}

impl HttpRemoteStore {
    /// Build a client for an already-normalised base URL.
    ///
    /// Use [`normalize_endpoint`] on user input first. The base URL is
    /// taken as-is so tests can point at a plain-http loopback server.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ExamError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request
            .send()
            .await
            .map_err(|e| ExamError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExamError::Network(e.to_string()))?;
        Ok((status, body))
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn get(&self, key: &str, token: &SecretString) -> Result<Option<String>> {
        let request = self
            .client
            .get(self.url(key))
            .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
            .header(CONTENT_TYPE, "application/json");
        let (status, body) = self.send(request).await?;
        debug!(key, status = status.as_u16(), bytes = body.len(), "remote get");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        // A missing key comes back as an empty 200 from the reference worker.
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(body))
    }

    async fn put(&self, key: &str, value: &str, token: &SecretString) -> Result<()> {
        let request = self
            .client
            .put(self.url(key))
            .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
            .header(CONTENT_TYPE, "application/json")
            .body(value.to_string());
        let (status, body) = self.send(request).await?;
        debug!(key, status = status.as_u16(), bytes = value.len(), "remote put");

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        Ok(())
    }

    async fn delete(&self, key: &str, token: &SecretString) -> Result<()> {
        let request = self
            .client
            .delete(self.url(key))
            .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
            .header(CONTENT_TYPE, "application/json");
        let (status, body) = self.send(request).await?;
        debug!(key, status = status.as_u16(), "remote delete");

        if status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        let cases = [
            ("kv.example.workers.dev", "https://kv.example.workers.dev"),
            ("http://kv.example.dev/", "https://kv.example.dev"),
            ("  HTTPS://kv.example.dev//  ", "https://kv.example.dev"),
            ("https://kv.example.dev/base", "https://kv.example.dev/base"),
            ("kv.examé.dev", "https://kv.examé.dev"),
            ("http://kvé.dev", "https://kvé.dev"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_endpoint(input).unwrap(), expected, "input {:?}", input);
        }
    }

    #[test]
    fn test_normalize_endpoint_rejects_garbage() {
        assert!(normalize_endpoint("   ").is_err());
        assert!(normalize_endpoint("https:///").is_err());
        assert!(normalize_endpoint("ftp://kv.example").is_err());
        assert!(normalize_endpoint("ééé://kv.example").is_err());
        assert!(normalize_endpoint("é").is_ok());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(status_error(401, "Invalid or Missing Token"), ExamError::Unauthorized));
        match status_error(500, "") {
            ExamError::Remote { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        match status_error(403, " quota exceeded ") {
            ExamError::Remote { message, .. } => assert_eq!(message, "quota exceeded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_url_joins_key() {
        let store = HttpRemoteStore::new("https://kv.example.dev/").unwrap();
        assert_eq!(store.url("exam-folders"), "https://kv.example.dev/exam-folders");
    }
}
