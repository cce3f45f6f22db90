//! # Credrotate
//!
//! Staged database credential rotation with blue/green identities.
//!
//! A rotation cycle moves a secret through four externally driven steps:
//! create a `PENDING` version with a fresh password, apply it to the
//! database, test it, and promote it to `CURRENT`. Every step is idempotent
//! under replay with the same token.
//!
//! The full APIs live in `credrotate-core` (model, faults, staged store,
//! orchestrator) and `credrotate-backends` (JSON-file secret store and
//! PostgreSQL service); the most used items are re-exported here.

pub use credrotate_backends::FileSecretBackend;
#[cfg(feature = "postgres")]
pub use credrotate_backends::{PostgresCredentialService, PostgresSettings, SslMode};
pub use credrotate_core::store::{SecretAdministration, SecretBackend};
pub use credrotate_core::{
    Credential, CredentialPayload, DatabaseCredential, DatabaseCredentialService, FaultKind,
    InMemorySecretBackend, Password, RotationConfig, RotationError, RotationOrchestrator,
    RotationOutcome, RotationRequest, RotationResult, RotationStep, RotationToken, SecretId,
    Stage, StagedCredentialStore, VersionedCredentialStore,
};
