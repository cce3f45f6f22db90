//! Validated identifier types
//!
//! Secret ids and rotation tokens arrive as raw strings from the invoking
//! adapter. Both are parsed once at the boundary and carried as distinct
//! newtypes so a token can never be passed where a secret id is expected.
//!
//! # Examples
//!
//! ```rust
//! use credrotate_core::identifiers::{RotationToken, SecretId};
//!
//! let id = SecretId::parse("arn:aws:secretsmanager:eu-central-1:123456789012:secret:db/app").unwrap();
//! let token = RotationToken::parse("c0ffee00-0000-4000-8000-000000000001").unwrap();
//!
//! assert!(SecretId::parse("").is_err());
//! assert!(RotationToken::parse("has space").is_err());
//! # let _ = (id, token);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while parsing an identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdValidationError {
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },

    #[error("{kind} exceeds maximum length of {max} characters (got {actual})")]
    TooLong {
        kind: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{kind} contains whitespace or control characters")]
    InvalidCharacters { kind: &'static str },
}

fn validate(kind: &'static str, value: &str, max: usize) -> Result<(), IdValidationError> {
    if value.is_empty() {
        return Err(IdValidationError::Empty { kind });
    }

    let actual = value.chars().count();
    if actual > max {
        return Err(IdValidationError::TooLong { kind, max, actual });
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(IdValidationError::InvalidCharacters { kind });
    }

    Ok(())
}

/// Logical identifier of a secret (a name or an ARN)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretId(String);

impl SecretId {
    /// Maximum accepted length, large enough for fully qualified ARNs
    pub const MAX_LENGTH: usize = 2048;

    /// Parse and validate a secret id
    pub fn parse(id: impl AsRef<str>) -> Result<Self, IdValidationError> {
        let id = id.as_ref();
        validate("secret id", id, Self::MAX_LENGTH)?;
        Ok(Self(id.to_string()))
    }

    /// Get the secret id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SecretId {
    type Err = IdValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<SecretId> for String {
    fn from(id: SecretId) -> Self {
        id.0
    }
}

impl TryFrom<String> for SecretId {
    type Error = IdValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

/// Idempotency key naming one version of a secret across retries
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RotationToken(String);

impl RotationToken {
    /// Maximum accepted length
    pub const MAX_LENGTH: usize = 64;

    /// Parse and validate a rotation token
    pub fn parse(token: impl AsRef<str>) -> Result<Self, IdValidationError> {
        let token = token.as_ref();
        validate("rotation token", token, Self::MAX_LENGTH)?;
        Ok(Self(token.to_string()))
    }

    /// Generate a fresh random token
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RotationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RotationToken {
    type Err = IdValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<RotationToken> for String {
    fn from(token: RotationToken) -> Self {
        token.0
    }
}

impl TryFrom<String> for RotationToken {
    type Error = IdValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}
