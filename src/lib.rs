//! # oidc-token-verifier
//!
//! Validates bearer tokens against an OpenID Connect authority: the signature is
//! checked with the authority's published JWKS, then a configured set of claims
//! is checked against expected values.
//!
//! ## Features
//! - **RSA only**: `RS*` and `PS*` tokens; symmetric algorithms are refused up front.
//! - **Cached keys**: the JWKS is fetched once per authority and kept for the life
//!   of the cache, with concurrent misses coalesced into one request.
//! - **Claim requirements**: scalar claims must match, list claims must contain
//!   the expected value.
//! - **Injectable collaborators**: HTTP client and cache are traits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oidc_token_verifier::{TokenVerifier, VerifierConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. Configure the authority and the claims every token must carry
//!     let config = VerifierConfig::new("https://idp.example.com")
//!         .require_claim("aud", "api")
//!         .require_claim("roles", "admin");
//!     let verifier = TokenVerifier::new(config)?;
//!
//!     // 2. Validate the token taken from the request
//!     let bearer_token = "eyJhbGciOiJSUzI1NiIsImtpZCI6IjEifQ...";
//!     match verifier.validate_token(bearer_token).await {
//!         Ok(_) => println!("token accepted"),
//!         Err(e) => eprintln!("token rejected: {}", e),
//!     }
//!
//!     Ok(())
//! }
//! ```

/// Claim values and claim requirements.
mod claims;
/// Verifier configuration.
mod config;
/// Defines error types for the library.
mod error;
/// Fetches and caches the authority's JWKS.
mod jwks;
/// Token parsing and signature verification.
mod parser;
/// HTTP and cache collaborator traits.
mod platform;
/// The verification façade.
mod verifier;


pub use claims::{ClaimRequirements, ClaimSet, ClaimValue, Scalar};
pub use config::{VerifierConfig, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LEEWAY_SECS};
pub use error::{AuthError, Result};
pub use jwks::{jwks_url, Jwk, KeySet, KeySetProvider, KeySetStore};
pub use parser::{create_decoding_key, parse_algorithm, JwtHeader, SignatureVerifier, Token};
pub use platform::{HttpClient, HttpResponse, KeySetCache, MemoryCache, ReqwestHttpClient};
pub use verifier::{strip_bearer, TokenVerifier};
