//! Defines the error types that can occur while verifying a bearer token.
//!
//! Every failure in the verification pipeline maps to exactly one variant, so a
//! rejected token always carries one specific reason back to the caller.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Represents errors that can occur during token verification.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// The token does not have the structure of a compact JWS.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The token declares a signing algorithm outside the RSA family.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The token header has no `kid`, or the `kid` is not a string.
    #[error("token header is missing a string kid")]
    MissingKeyId,

    /// Zero or several keys in the JWKS carry the token's `kid`.
    #[error("unable to find a unique key for kid '{0}'")]
    KeyNotFound(String),

    /// The matched key is not an RSA key.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// A component of the matched key is missing or cannot be decoded.
    #[error("invalid key component: {0}")]
    InvalidKeyComponent(String),

    /// The signature does not match the header and payload.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// The `exp` claim lies in the past.
    #[error("token has expired")]
    Expired,

    /// The `nbf` claim lies in the future.
    #[error("token is not yet valid")]
    NotYetValid,

    /// The JWKS could not be fetched from the authority or could not be parsed.
    #[error("failed to fetch JWKS: {0}")]
    Fetch(String),

    /// Claims were checked on a token whose signature was never verified.
    #[error("invalid token")]
    InvalidToken,

    /// A configured claim requirement does not hold.
    #[error("claims validate failed, invalid claim: {0}")]
    ClaimValidation(String),

    /// The verifier configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
