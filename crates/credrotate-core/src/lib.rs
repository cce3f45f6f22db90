//! # Credrotate Core
//!
//! Staged database credential rotation.
//! This crate provides the credential model, the fault taxonomy, the staged
//! credential store and the rotation state machine that drives a secret
//! through create, set, test and finish.

pub mod config;
pub mod credential;
pub mod database;
pub mod error;
pub mod identifiers;
pub mod model;
pub mod orchestrator;
pub mod password;
pub mod store;
pub mod strategy;

pub use config::{ConfigError, RotationConfig};
pub use credential::{Credential, CredentialPayload, DatabaseCredential, Password};
pub use database::DatabaseCredentialService;
pub use error::{
    BackendError, BackendKind, BackendResult, ConnectionFailureKind, FaultKind, RotationError,
    RotationResult,
};
pub use identifiers::{IdValidationError, RotationToken, SecretId};
pub use model::{RotationOutcome, RotationRequest, RotationStep, Stage};
pub use orchestrator::RotationOrchestrator;
pub use password::PasswordPolicy;
pub use store::{
    CacheStats, InMemorySecretBackend, SecretAdministration, SecretBackend, SecretDescription,
    SecretRecord, SecretTable, SecretVersion, StageMove, StagedCredentialStore,
    StagingMetadataCache, VersionedCredentialStore,
};
pub use strategy::{RotationMode, next_username};
