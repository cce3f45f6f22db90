//! Rotation faults.
//!
//! Guard outcomes (rotation disabled, version already current) are not
//! faults; they surface as `RotationOutcome::NothingToRotate`. Every variant
//! here aborts the current step and is propagated to the caller unmodified.
//! Retrying is the scheduler's job: replaying the same step with the same
//! token is always the recovery action.

use std::fmt;
use thiserror::Error;

use super::backend::BackendError;

/// Why a database connection attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailureKind {
    /// The server was reached but rejected the username/password
    Authentication,
    /// The server could not be reached or the session broke
    Network,
}

impl fmt::Display for ConnectionFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionFailureKind::Authentication => write!(f, "authentication"),
            ConnectionFailureKind::Network => write!(f, "network"),
        }
    }
}

/// Coarse classification of a [`RotationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Validation,
    State,
    Consistency,
    Connection,
    PasswordChangeRejected,
    InvalidStep,
    Store,
}

/// Errors that can occur while executing a rotation step
#[derive(Debug, Clone, Error)]
pub enum RotationError {
    /// A stored payload or an identifier does not satisfy the required schema
    #[error("Validation fault for secret '{secret_id}': {reason}")]
    Validation { secret_id: String, reason: String },

    /// A token names no known version, or a version carries unexpected stage labels
    #[error("State fault for secret '{secret_id}': {reason}")]
    State { secret_id: String, reason: String },

    /// Pending/current/previous usernames break the relationship required by the rotation mode
    #[error("Consistency fault for secret '{secret_id}': {reason}")]
    Consistency { secret_id: String, reason: String },

    /// The database could not be reached or refused to authenticate
    #[error("Connection to {target} failed ({kind}): {reason}")]
    Connection {
        kind: ConnectionFailureKind,
        target: String,
        reason: String,
    },

    /// The acting credential logged in but the password change was refused
    #[error("Password change for user '{username}' rejected: {reason}")]
    PasswordChangeRejected { username: String, reason: String },

    /// Unknown rotation step value
    #[error("Invalid rotation step: {value}")]
    InvalidStep { value: String },

    /// Secret backend failure
    #[error("Secret store error: {0}")]
    Store(#[from] BackendError),
}

impl RotationError {
    /// Create a validation fault.
    pub fn validation(secret_id: impl Into<String>, reason: impl Into<String>) -> Self {
        RotationError::Validation {
            secret_id: secret_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a state fault.
    pub fn state(secret_id: impl Into<String>, reason: impl Into<String>) -> Self {
        RotationError::State {
            secret_id: secret_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a consistency fault.
    pub fn consistency(secret_id: impl Into<String>, reason: impl Into<String>) -> Self {
        RotationError::Consistency {
            secret_id: secret_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection fault.
    pub fn connection(
        kind: ConnectionFailureKind,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RotationError::Connection {
            kind,
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            RotationError::Validation { .. } => FaultKind::Validation,
            RotationError::State { .. } => FaultKind::State,
            RotationError::Consistency { .. } => FaultKind::Consistency,
            RotationError::Connection { .. } => FaultKind::Connection,
            RotationError::PasswordChangeRejected { .. } => FaultKind::PasswordChangeRejected,
            RotationError::InvalidStep { .. } => FaultKind::InvalidStep,
            RotationError::Store(_) => FaultKind::Store,
        }
    }

    /// True when the database was reached but refused the credential.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            RotationError::Connection {
                kind: ConnectionFailureKind::Authentication,
                ..
            }
        )
    }

    /// True for faults where a replay may succeed without operator action.
    pub fn is_transient(&self) -> bool {
        match self {
            RotationError::Connection { kind, .. } => *kind == ConnectionFailureKind::Network,
            RotationError::Store(BackendError::Io { .. }) => true,
            RotationError::Store(BackendError::LockPoisoned { .. }) => true,
            _ => false,
        }
    }
}

/// Result type for rotation operations
pub type RotationResult<T> = Result<T, RotationError>;
