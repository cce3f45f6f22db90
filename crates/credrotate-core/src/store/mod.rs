//! Versioned credential storage
//!
//! Two layers:
//! - [`SecretBackend`]: a remote-store-shaped contract over raw payloads and
//!   stage labels (describe, get, put, move stages)
//! - [`VersionedCredentialStore`]: the staging operations the rotation
//!   orchestrator relies on, implemented once by [`StagedCredentialStore`]
//!
//! Backends that can also act as the rotation scheduler implement
//! [`SecretAdministration`].

mod cache;
mod in_memory;
mod record;
mod staged;

pub use cache::{CacheStats, StagingMetadataCache};
pub use in_memory::InMemorySecretBackend;
pub use record::{SecretRecord, SecretTable, SecretVersion};
pub use staged::StagedCredentialStore;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::credential::CredentialPayload;
use crate::error::{BackendKind, BackendResult, RotationResult};
use crate::identifiers::{RotationToken, SecretId};
use crate::model::Stage;

/// Staging metadata of one secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretDescription {
    pub secret_id: SecretId,
    pub rotation_enabled: bool,
    /// Every known version and the stages it holds
    pub versions: BTreeMap<RotationToken, BTreeSet<Stage>>,
}

impl SecretDescription {
    /// Stages held by `token`, or `None` for an unknown version
    pub fn stages_of(&self, token: &RotationToken) -> Option<&BTreeSet<Stage>> {
        self.versions.get(token)
    }

    /// Versions labeled with `stage`
    pub fn holders(&self, stage: Stage) -> Vec<&RotationToken> {
        self.versions
            .iter()
            .filter(|(_, stages)| stages.contains(&stage))
            .map(|(token, _)| token)
            .collect()
    }
}

/// Relabel instruction: attach `stage` to `to`, or drop it entirely when `to` is `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageMove {
    pub stage: Stage,
    pub to: Option<RotationToken>,
}

impl StageMove {
    pub fn attach(stage: Stage, token: RotationToken) -> Self {
        Self {
            stage,
            to: Some(token),
        }
    }

    pub fn remove(stage: Stage) -> Self {
        Self { stage, to: None }
    }
}

/// Low-level secret store holding raw payload versions and stage labels
#[async_trait]
pub trait SecretBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn describe_secret(&self, secret_id: &SecretId) -> BackendResult<SecretDescription>;

    /// Raw payload of the version holding `stage`
    ///
    /// With `token`, the version must also be the one named by the token.
    /// A version registered without a payload reads as `None`.
    async fn get_secret_value(
        &self,
        secret_id: &SecretId,
        stage: Stage,
        token: Option<&RotationToken>,
    ) -> BackendResult<Option<String>>;

    /// Store `payload` under `token` and attach `stages` to it
    ///
    /// Writing the same payload twice under one token is a no-op; a
    /// different payload is a `VersionConflict`. Attaching a stage removes it
    /// from every other version.
    async fn put_secret_value(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
        payload: &str,
        stages: &[Stage],
    ) -> BackendResult<()>;

    /// Apply all moves as one atomic relabeling
    async fn move_stages(&self, secret_id: &SecretId, moves: &[StageMove]) -> BackendResult<()>;
}

/// Operations normally owned by the external rotation scheduler or an operator
#[async_trait]
pub trait SecretAdministration: SecretBackend {
    /// Create a secret whose first version is `CURRENT`
    async fn create_secret(
        &self,
        secret_id: &SecretId,
        payload: &str,
        rotation_enabled: bool,
    ) -> BackendResult<RotationToken>;

    /// Write a version with explicit stages
    async fn put_version(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
        payload: &str,
        stages: &[Stage],
    ) -> BackendResult<()> {
        self.put_secret_value(secret_id, token, payload, stages).await
    }

    /// Register `token` as `PENDING` without a payload
    ///
    /// This is what a scheduler does before invoking the first rotation step.
    async fn start_rotation(&self, secret_id: &SecretId, token: &RotationToken) -> BackendResult<()>;

    async fn set_rotation_enabled(&self, secret_id: &SecretId, enabled: bool) -> BackendResult<()>;

    /// Snapshot of everything stored for a secret
    async fn secret_record(&self, secret_id: &SecretId) -> BackendResult<SecretRecord>;

    async fn list_secrets(&self) -> BackendResult<Vec<SecretId>>;
}

/// Staged credential store used by the rotation orchestrator
#[async_trait]
pub trait VersionedCredentialStore: Send + Sync {
    /// Administrative flag; no side effects
    async fn is_rotation_enabled(&self, secret_id: &SecretId) -> RotationResult<bool>;

    /// Credential at `stage`, optionally pinned to `token`
    ///
    /// Absent stages yield `Ok(None)`. A payload that does not satisfy the
    /// schema of `C` is a validation fault.
    async fn get_credential<C: CredentialPayload>(
        &self,
        secret_id: &SecretId,
        stage: Stage,
        token: Option<&RotationToken>,
    ) -> RotationResult<Option<C>>;

    /// `Ok(false)` when `token` is already `CURRENT`, `Ok(true)` when it is
    /// `PENDING`; a state fault for an unknown or unlabeled version.
    async fn ensure_staging_valid(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
    ) -> RotationResult<bool>;

    /// Store `credential` with a fresh password as `PENDING` under `token`
    ///
    /// No-op when a pending value already exists.
    async fn create_pending_version<C: CredentialPayload>(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
        credential: &C,
    ) -> RotationResult<()>;

    /// Make `token` `CURRENT` and the old current `PREVIOUS`
    ///
    /// No-op when `token` is already `CURRENT`.
    async fn promote_pending_to_current(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
    ) -> RotationResult<()>;

    /// Write `credential` as a new version and promote it immediately
    async fn replace_current_credential<C: CredentialPayload>(
        &self,
        secret_id: &SecretId,
        credential: &C,
    ) -> RotationResult<RotationToken>;

    /// Drop any cached staging metadata for `secret_id`
    async fn forget_metadata(&self, _secret_id: &SecretId) {}
}
