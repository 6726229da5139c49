//! Verifier configuration.
//!
//! Loading is left to the embedding service; [`VerifierConfig`] deserializes from
//! any serde format and can also be built in code.

use crate::claims::{ClaimRequirements, Scalar};
use crate::error::{AuthError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default clock-skew tolerance for `exp` and `nbf` (30 seconds).
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Default timeout for JWKS requests made by the built-in HTTP client (5 seconds).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

/// Configuration consumed by [`crate::TokenVerifier`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VerifierConfig {
    /// Base URL of the identity authority (e.g., "https://idp.example.com").
    pub authority: String,
    /// Claim name to expected value.
    #[serde(default)]
    pub claims: BTreeMap<String, Scalar>,
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_leeway_secs() -> u64 {
    DEFAULT_LEEWAY_SECS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl VerifierConfig {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            claims: BTreeMap::new(),
            leeway_secs: DEFAULT_LEEWAY_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }

    /// Adds (or replaces) an expected claim value.
    pub fn require_claim(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn claim_requirements(&self) -> ClaimRequirements {
        ClaimRequirements::new(self.claims.clone())
    }

    /// Checks that the authority is an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.authority).map_err(|e| {
            AuthError::InvalidConfig(format!("invalid authority URL '{}': {e}", self.authority))
        })?;

        match url.scheme() {
            "https" => {}
            "http" => {
                let is_localhost = matches!(
                    url.host_str(),
                    Some("localhost") | Some("127.0.0.1") | Some("[::1]")
                );
                if !is_localhost {
                    tracing::warn!("Authority URL should use HTTPS: {}", self.authority);
                }
            }
            other => {
                return Err(AuthError::InvalidConfig(format!(
                    "unsupported authority scheme: {other}"
                )))
            }
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(AuthError::InvalidConfig(
                "authority URL must not have a query or fragment".to_string(),
            ));
        }

        Ok(())
    }
}
