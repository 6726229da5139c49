//! Collaborator traits for the verifier.
//!
//! The verifier never talks to the network or to shared state directly. It goes
//! through an [`HttpClient`] to reach the authority and a [`KeySetCache`] to hold
//! fetched key sets, so both can be swapped for deterministic fakes in tests.

use crate::error::{AuthError, Result};
use crate::jwks::KeySet;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// HTTP client used to reach the identity authority.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Response from an outbound request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Shared store for fetched key sets.
///
/// Entries never expire. `set` is last-write-wins; implementations must be safe
/// for concurrent readers and writers.
#[async_trait]
pub trait KeySetCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Arc<KeySet>>;
    async fn set(&self, key: &str, value: Arc<KeySet>);
}

/// [`HttpClient`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Builds a client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client, keeping whatever settings it was built with.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AuthError::Fetch(format!("request to {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::Fetch(format!("failed to read response body: {e}")))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// In-process [`KeySetCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Arc<KeySet>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeySetCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Arc<KeySet>> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Arc<KeySet>) {
        self.entries.write().await.insert(key.to_string(), value);
    }
}
