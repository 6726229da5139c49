//! # JWT Parsing and Signature Verification
//!
//! Parses compact JWS tokens and verifies their signature against the
//! authority's key set.
//!
//! ## Requirements
//! - Only RSA-family algorithms (`RS*`, `PS*`) are accepted. Symmetric algorithms
//!   are refused before any key is consulted, so a client can never get a public
//!   key used as an HMAC secret.
//! - The signing key is selected by the header `kid` and must be unique in the set.
//! - `exp` and `nbf` are checked when present, with configurable leeway.

use crate::claims::ClaimSet;
use crate::error::{AuthError, Result};
use crate::jwks::{Jwk, KeySetProvider};
use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JWT Header structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtHeader {
    /// Algorithm
    pub alg: String,
    /// Key ID, kept raw so a non-string value can be told apart from a missing one.
    #[serde(default)]
    pub kid: Option<Value>,
    /// Token type
    #[serde(default)]
    pub typ: Option<String>,
}

impl JwtHeader {
    /// The key identifier, when present and a string.
    pub fn key_id(&self) -> Option<&str> {
        match &self.kid {
            Some(Value::String(kid)) => Some(kid),
            _ => None,
        }
    }
}

/// A parsed token.
///
/// Only [`SignatureVerifier::verify`] produces a token that reports itself as
/// verified; [`Token::parse`] merely decodes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    header: JwtHeader,
    claims: ClaimSet,
    verified: bool,
}

impl Token {
    /// Decodes header and payload without checking the signature.
    pub fn parse(token: &str) -> Result<Self> {
        Self::decode_parts(token).map_err(|e| {
            tracing::warn!("Rejecting malformed token: {}", e);
            e
        })
    }

    fn decode_parts(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthError::MalformedToken(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        }
        if parts[0].is_empty() || parts[1].is_empty() {
            return Err(AuthError::MalformedToken("empty header or payload".to_string()));
        }

        let header_bytes = decode_segment(parts[0], "header")?;
        let header: JwtHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| AuthError::MalformedToken(format!("invalid header: {e}")))?;

        let payload_bytes = decode_segment(parts[1], "payload")?;
        let claims: ClaimSet = serde_json::from_slice(&payload_bytes)
            .map_err(|e| AuthError::MalformedToken(format!("invalid payload: {e}")))?;

        Ok(Self {
            header,
            claims,
            verified: false,
        })
    }

    pub fn header(&self) -> &JwtHeader {
        &self.header
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Whether the signature has been checked against the authority's keys.
    pub fn is_verified(&self) -> bool {
        self.verified
    }
}

/// Base64url-decodes one unpadded token segment.
fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>> {
    general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::MalformedToken(format!("{name} is not base64url: {e}")))
}

/// Parses an RSA-family algorithm name.
pub fn parse_algorithm(alg: &str) -> Result<Algorithm> {
    match alg {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "PS256" => Ok(Algorithm::PS256),
        "PS384" => Ok(Algorithm::PS384),
        "PS512" => Ok(Algorithm::PS512),
        other => {
            tracing::warn!("Unexpected signing method: {}", other);
            Err(AuthError::UnsupportedAlgorithm(other.to_string()))
        }
    }
}

/// Creates an RSA decoding key from a JWK.
pub fn create_decoding_key(jwk: &Jwk) -> Result<DecodingKey> {
    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_deref().ok_or_else(|| {
                AuthError::InvalidKeyComponent("Missing modulus for RSA key".to_string())
            })?;
            let e = jwk.e.as_deref().ok_or_else(|| {
                AuthError::InvalidKeyComponent("Missing exponent for RSA key".to_string())
            })?;
            if n.is_empty() || e.is_empty() {
                return Err(AuthError::InvalidKeyComponent(
                    "Empty RSA key component".to_string(),
                ));
            }

            DecodingKey::from_rsa_components(n, e).map_err(|e| {
                AuthError::InvalidKeyComponent(format!(
                    "Failed to create key from RSA components: {e}"
                ))
            })
        }
        unsupported_kty => Err(AuthError::UnsupportedKeyType(unsupported_kty.to_string())),
    }
}

/// Verifies token signatures against a key set.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    /// Clock-skew tolerance for `exp` and `nbf`, in seconds.
    leeway: u64,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LEEWAY_SECS)
    }
}

impl SignatureVerifier {
    pub fn new(leeway: u64) -> Self {
        Self { leeway }
    }

    /// Parses `token` and verifies its signature with the matching key from `keys`.
    pub async fn verify(&self, token: &str, keys: &dyn KeySetProvider) -> Result<Token> {
        let parsed = Token::parse(token)?;
        let algorithm = parse_algorithm(&parsed.header.alg)?;

        let kid = parsed.header.key_id().ok_or_else(|| {
            tracing::warn!("Token header has no string kid");
            AuthError::MissingKeyId
        })?;

        let key_set = keys.key_set().await?;
        let matches = key_set.lookup_key_id(kid);
        let jwk = match matches.as_slice() {
            [jwk] => *jwk,
            _ => {
                tracing::warn!(
                    "Expected exactly one key with kid '{}', found {}",
                    kid,
                    matches.len()
                );
                return Err(AuthError::KeyNotFound(kid.to_string()));
            }
        };

        let decoding_key = create_decoding_key(jwk)?;
        let claims = self.verify_and_decode(token, &decoding_key, algorithm)?;

        tracing::debug!("Signature verified with key '{}'", kid);
        Ok(Token {
            header: parsed.header,
            claims,
            verified: true,
        })
    }

    fn verify_and_decode(
        &self,
        token: &str,
        decoding_key: &DecodingKey,
        algorithm: Algorithm,
    ) -> Result<ClaimSet> {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // Audience and other claims are checked by the claim requirements instead.
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = self.leeway;

        let token_data = decode::<ClaimSet>(token, decoding_key, &validation).map_err(|e| {
            tracing::warn!("JWT validation failed: {:?}", e);
            match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::ImmatureSignature => AuthError::NotYetValid,
                ErrorKind::InvalidRsaKey(msg) => AuthError::InvalidKeyComponent(msg.clone()),
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                    AuthError::MalformedToken(e.to_string())
                }
                _ => AuthError::InvalidSignature,
            }
        })?;

        Ok(token_data.claims)
    }
}
