//! Secret backend errors.
//!
//! These describe failures of the storage layer underneath the staged
//! credential store. They are wrapped into [`RotationError::Store`] at the
//! store boundary.
//!
//! [`RotationError::Store`]: super::RotationError::Store

use std::fmt;
use thiserror::Error;

/// Which secret backend produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Process-local backend
    InMemory,
    /// JSON file backend
    File,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::InMemory => write!(f, "in-memory"),
            BackendKind::File => write!(f, "file"),
        }
    }
}

/// Errors raised by a [`SecretBackend`](crate::store::SecretBackend).
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Secret '{secret_id}' not found on {backend} backend")]
    SecretNotFound {
        backend: BackendKind,
        secret_id: String,
    },

    #[error("Version '{token}' of secret '{secret_id}' already holds a different value on {backend} backend")]
    VersionConflict {
        backend: BackendKind,
        secret_id: String,
        token: String,
    },

    #[error("Secret '{secret_id}' has no version '{token}' on {backend} backend")]
    VersionNotFound {
        backend: BackendKind,
        secret_id: String,
        token: String,
    },

    #[error("Secret '{secret_id}' already exists on {backend} backend")]
    SecretExists {
        backend: BackendKind,
        secret_id: String,
    },

    #[error("I/O error on {backend} backend: {details}")]
    Io { backend: BackendKind, details: String },

    #[error("Serialization error on {backend} backend: {details}")]
    Serialization { backend: BackendKind, details: String },

    #[error("Lock poisoned on {backend} backend")]
    LockPoisoned { backend: BackendKind },
}

impl BackendError {
    /// Backend that produced this error
    pub fn backend(&self) -> BackendKind {
        match self {
            BackendError::SecretNotFound { backend, .. }
            | BackendError::VersionConflict { backend, .. }
            | BackendError::VersionNotFound { backend, .. }
            | BackendError::SecretExists { backend, .. }
            | BackendError::Io { backend, .. }
            | BackendError::Serialization { backend, .. }
            | BackendError::LockPoisoned { backend } => *backend,
        }
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;
