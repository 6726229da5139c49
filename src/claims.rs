//! # Claims Validation
//!
//! Checks a configured set of expected claim values against a verified token.
//!
//! The comparison policy is decided by the shape of the token's claim:
//! - a scalar claim must equal the expected value (numbers compare by value,
//!   so `1` and `1.0` match)
//! - a list claim must contain the expected value
//! - anything else (objects, `null`, lists of non-scalars) fails

use crate::error::{AuthError, Result};
use crate::parser::Token;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A single JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl Scalar {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }

    /// Compares two scalars as JSON values.
    ///
    /// Unlike `==`, numbers match by value rather than by representation.
    /// Values of different types never match.
    pub fn matches(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => numbers_equal(a, b),
            _ => self == other,
        }
    }
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a == b;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Number(n) => Value::Number(n),
            Scalar::String(s) => Value::String(s),
        }
    }
}

/// The value of one claim in a token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ClaimValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
    /// Any shape that is neither a scalar nor a list of scalars.
    Other(Value),
}

impl From<Value> for ClaimValue {
    fn from(value: Value) -> Self {
        if let Some(scalar) = Scalar::from_value(&value) {
            return Self::Scalar(scalar);
        }
        if let Value::Array(items) = &value {
            if let Some(list) = items.iter().map(Scalar::from_value).collect::<Option<Vec<_>>>() {
                return Self::List(list);
            }
        }
        Self::Other(value)
    }
}

impl From<ClaimValue> for Value {
    fn from(value: ClaimValue) -> Self {
        match value {
            ClaimValue::Scalar(s) => s.into(),
            ClaimValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ClaimValue::Other(v) => v,
        }
    }
}

/// The payload of a token: claim name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(HashMap<String, ClaimValue>);

impl ClaimSet {
    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the claim as a string, if it is a string scalar.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ClaimValue::Scalar(Scalar::String(s))) => Some(s),
            _ => None,
        }
    }

    /// Subject (`sub`) claim.
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Issuer (`iss`) claim.
    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }
}

impl FromIterator<(String, ClaimValue)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (String, ClaimValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Expected claim values, fixed at verifier construction.
///
/// Requirements are checked in claim-name order, so the first failure reported
/// for a token is deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClaimRequirements {
    expected: BTreeMap<String, Scalar>,
}

impl ClaimRequirements {
    pub fn new(expected: BTreeMap<String, Scalar>) -> Self {
        Self { expected }
    }

    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.expected.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Checks every requirement against a signature-verified token.
    ///
    /// Returns `Ok(true)` when all requirements hold. The first failing claim
    /// aborts the check with [`AuthError::ClaimValidation`].
    pub fn validate(&self, token: &Token) -> Result<bool> {
        if !token.is_verified() {
            tracing::warn!("Refusing to validate claims of an unverified token");
            return Err(AuthError::InvalidToken);
        }

        for (name, expected) in &self.expected {
            let satisfied = match token.claims().get(name) {
                Some(ClaimValue::Scalar(actual)) => actual.matches(expected),
                Some(ClaimValue::List(items)) => items.iter().any(|item| item.matches(expected)),
                Some(ClaimValue::Other(_)) | None => false,
            };

            if !satisfied {
                tracing::warn!("Claim '{}' does not satisfy its requirement", name);
                return Err(AuthError::ClaimValidation(name.clone()));
            }
        }

        Ok(true)
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for ClaimRequirements {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            expected: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
