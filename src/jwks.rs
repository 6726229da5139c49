//! # JWKS (JSON Web Key Set) Store
//!
//! Fetches the authority's published signing keys and keeps them in a shared,
//! non-expiring cache keyed by the JWKS URL.
//!
//! ## Caching Strategy
//! 1. Uses the cached key set whenever one exists for the URL
//! 2. On a miss, fetches `{authority}/.well-known/openid-configuration/jwks`
//! 3. Stores the result with no expiration; stale keys persist until restart
//!
//! Concurrent misses on the same store are coalesced into a single fetch, and
//! every waiter receives that fetch's outcome, failures included. A failure is
//! not cached: the next miss after it completes fetches again.

use crate::error::{AuthError, Result};
use crate::platform::{HttpClient, KeySetCache};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Path appended to the authority base URL to reach its key set.
const JWKS_PATH: &str = ".well-known/openid-configuration/jwks";

/// Represents a JSON Web Key (JWK).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Jwk {
    /// Key ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Key type (e.g., "RSA").
    pub kty: String,
    /// Algorithm (e.g., "RS256").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Key usage (e.g., "sig").
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Key operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,
    /// RSA modulus, base64url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent, base64url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// Curve (for EC keys).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// X coordinate (for EC keys).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Y coordinate (for EC keys).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// A JWKS document as published by the authority.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct KeySet {
    /// The keys, in document order.
    pub keys: Vec<Jwk>,
}

impl KeySet {
    /// Returns every key whose `kid` equals `kid`.
    pub fn lookup_key_id(&self, kid: &str) -> Vec<&Jwk> {
        self.keys
            .iter()
            .filter(|key| key.kid.as_deref() == Some(kid))
            .collect()
    }
}

/// Builds the JWKS endpoint for an authority base URL.
///
/// Trailing slashes are collapsed to exactly one before the path is appended.
pub fn jwks_url(authority: &str) -> String {
    format!("{}/{}", authority.trim_end_matches('/'), JWKS_PATH)
}

/// Anything that can hand out the authority's current key set.
#[async_trait]
pub trait KeySetProvider: Send + Sync {
    async fn key_set(&self) -> Result<Arc<KeySet>>;
}

/// A fixed key set never changes and never touches the network.
#[async_trait]
impl KeySetProvider for KeySet {
    async fn key_set(&self) -> Result<Arc<KeySet>> {
        Ok(Arc::new(self.clone()))
    }
}

/// Outcome of one fetch, shared by every caller that joined it.
type InFlight = Arc<OnceCell<Result<Arc<KeySet>>>>;

/// Fetches and caches the key set of a single authority.
pub struct KeySetStore {
    /// The JWKS endpoint, also used as the cache key.
    jwks_url: String,
    http: Arc<dyn HttpClient>,
    cache: Arc<dyn KeySetCache>,
    /// The fetch currently in progress, if any.
    in_flight: Mutex<Option<InFlight>>,
}

impl KeySetStore {
    /// Creates a store for `authority`, backed by the given collaborators.
    pub fn new(authority: &str, http: Arc<dyn HttpClient>, cache: Arc<dyn KeySetCache>) -> Self {
        Self {
            jwks_url: jwks_url(authority),
            http,
            cache,
            in_flight: Mutex::new(None),
        }
    }

    /// The JWKS endpoint this store reads from.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Returns the cached key set, fetching it from the authority on a miss.
    pub async fn get_key_set(&self) -> Result<Arc<KeySet>> {
        if let Some(cached) = self.cache.get(&self.jwks_url).await {
            tracing::debug!("Using cached JWKS for {}", self.jwks_url);
            return Ok(cached);
        }

        let fetch = {
            let mut slot = self.in_flight.lock().await;
            Arc::clone(slot.get_or_insert_with(|| Arc::new(OnceCell::new())))
        };

        let outcome = fetch
            .get_or_init(|| self.fetch_and_store())
            .await
            .clone();

        // The first caller to finish retires the slot so a later miss fetches again.
        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &fetch)) {
            *slot = None;
        }

        outcome
    }

    async fn fetch_and_store(&self) -> Result<Arc<KeySet>> {
        // Another fetch may have filled the cache since our miss.
        if let Some(cached) = self.cache.get(&self.jwks_url).await {
            tracing::debug!("JWKS cache was populated while waiting for fetch");
            return Ok(cached);
        }

        let key_set = Arc::new(self.fetch().await?);
        self.cache.set(&self.jwks_url, Arc::clone(&key_set)).await;
        tracing::info!(
            "Cached JWKS from {} ({} keys)",
            self.jwks_url,
            key_set.keys.len()
        );

        Ok(key_set)
    }

    async fn fetch(&self) -> Result<KeySet> {
        tracing::info!("Fetching JWKS from: {}", self.jwks_url);

        let response = self.http.get(&self.jwks_url).await.map_err(|e| {
            tracing::error!("JWKS request failed: {}", e);
            match e {
                AuthError::Fetch(msg) => AuthError::Fetch(msg),
                other => AuthError::Fetch(other.to_string()),
            }
        })?;

        if !response.is_success() {
            let error_msg = format!("JWKS endpoint returned status: {}", response.status);
            tracing::error!("{}", error_msg);
            return Err(AuthError::Fetch(error_msg));
        }

        let key_set: KeySet = response.json().map_err(|e| {
            let error_msg = format!("Failed to parse JWKS response: {e}");
            tracing::error!("{}", error_msg);
            AuthError::Fetch(error_msg)
        })?;

        if key_set.keys.is_empty() {
            let error_msg = "JWKS response contains no keys";
            tracing::error!("{}", error_msg);
            return Err(AuthError::Fetch(error_msg.to_string()));
        }

        Ok(key_set)
    }
}

#[async_trait]
impl KeySetProvider for KeySetStore {
    async fn key_set(&self) -> Result<Arc<KeySet>> {
        self.get_key_set().await
    }
}

impl std::fmt::Debug for KeySetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetStore")
            .field("jwks_url", &self.jwks_url)
            .finish_non_exhaustive()
    }
}
