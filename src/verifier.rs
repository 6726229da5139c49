//! Token verification façade.
//!
//! Runs the two stages in order, signature first and claims second, and stops
//! at the first failure. Configuration is never modified by a call.

use crate::claims::ClaimRequirements;
use crate::config::VerifierConfig;
use crate::error::{AuthError, Result};
use crate::jwks::KeySetStore;
use crate::parser::{SignatureVerifier, Token};
use crate::platform::{HttpClient, KeySetCache, MemoryCache, ReqwestHttpClient};
use std::sync::Arc;

/// Validates bearer tokens issued by one authority.
#[derive(Debug)]
pub struct TokenVerifier {
    authority: String,
    key_sets: KeySetStore,
    signatures: SignatureVerifier,
    requirements: ClaimRequirements,
}

impl TokenVerifier {
    /// Builds a verifier with a pooled reqwest client and a private in-memory cache.
    pub fn new(config: VerifierConfig) -> Result<Self> {
        let http = Arc::new(ReqwestHttpClient::new(config.http_timeout())?);
        Self::with_collaborators(config, http, Arc::new(MemoryCache::new()))
    }

    /// Builds a verifier over caller-supplied collaborators.
    ///
    /// Verifiers sharing one `cache` share fetched key sets.
    pub fn with_collaborators(
        config: VerifierConfig,
        http: Arc<dyn HttpClient>,
        cache: Arc<dyn KeySetCache>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            key_sets: KeySetStore::new(&config.authority, http, cache),
            signatures: SignatureVerifier::new(config.leeway_secs),
            requirements: config.claim_requirements(),
            authority: config.authority,
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn requirements(&self) -> &ClaimRequirements {
        &self.requirements
    }

    pub fn key_sets(&self) -> &KeySetStore {
        &self.key_sets
    }

    /// Returns `Ok(true)` when `token` is signed by the authority and satisfies
    /// every claim requirement.
    pub async fn validate_token(&self, token: &str) -> Result<bool> {
        self.verify_token(token).await.map(|_| true)
    }

    /// Like [`Self::validate_token`], returning the validated token.
    pub async fn verify_token(&self, token: &str) -> Result<Token> {
        let verified = self.signatures.verify(token, &self.key_sets).await?;
        self.requirements.validate(&verified)?;

        tracing::debug!(
            "Token validated for subject: {}",
            verified.claims().subject().unwrap_or("<none>")
        );
        Ok(verified)
    }

    /// Validates the value of an `Authorization` header (`Bearer <token>`).
    pub async fn validate_bearer(&self, header_value: &str) -> Result<Token> {
        let token = strip_bearer(header_value)?;
        self.verify_token(token).await
    }
}

/// Extracts the token from a `Bearer` authorization value.
pub fn strip_bearer(header_value: &str) -> Result<&str> {
    let header_value = header_value.trim();
    match header_value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() {
                Err(AuthError::MalformedToken("empty bearer token".to_string()))
            } else {
                Ok(token)
            }
        }
        _ => Err(AuthError::MalformedToken(
            "authorization value is not a bearer token".to_string(),
        )),
    }
}
