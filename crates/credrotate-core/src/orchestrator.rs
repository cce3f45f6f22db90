//! Rotation state machine
//!
//! One call per step, driven by an external scheduler that may replay any
//! step with the same token. Every step is safe to replay.

use tracing::{debug, error, info, warn};

use crate::credential::{Credential, DatabaseCredential};
use crate::database::DatabaseCredentialService;
use crate::error::{ConnectionFailureKind, FaultKind, RotationError, RotationResult};
use crate::identifiers::{RotationToken, SecretId};
use crate::model::{RotationOutcome, RotationRequest, RotationStep, Stage};
use crate::store::VersionedCredentialStore;
use crate::strategy::RotationMode;

/// Drives a secret through create, set, test and finish
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = RotationOrchestrator::new(store, database);
/// let outcome = orchestrator
///     .rotate(RotationStep::CreateSecret, &secret_id, &token)
///     .await?;
/// ```
pub struct RotationOrchestrator<S, D> {
    store: S,
    database: D,
}

impl<S, D> RotationOrchestrator<S, D>
where
    S: VersionedCredentialStore,
    D: DatabaseCredentialService,
{
    pub fn new(store: S, database: D) -> Self {
        Self { store, database }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn database(&self) -> &D {
        &self.database
    }

    /// Run a request decoded by an adapter
    pub async fn handle(&self, request: RotationRequest) -> RotationResult<RotationOutcome> {
        self.rotate(request.step, &request.secret_id, &request.token)
            .await
    }

    /// Execute one rotation step
    ///
    /// Returns [`RotationOutcome::NothingToRotate`] when rotation is disabled
    /// for the secret or the token is already `CURRENT`.
    pub async fn rotate(
        &self,
        step: RotationStep,
        secret_id: &SecretId,
        token: &RotationToken,
    ) -> RotationResult<RotationOutcome> {
        self.store.forget_metadata(secret_id).await;

        if !self.store.is_rotation_enabled(secret_id).await? {
            warn!(secret_id = %secret_id, step = %step, "Rotation is not enabled for the secret");
            return Ok(RotationOutcome::NothingToRotate);
        }

        if !self.store.ensure_staging_valid(secret_id, token).await? {
            return Ok(RotationOutcome::NothingToRotate);
        }

        match step {
            RotationStep::CreateSecret => self.create_secret(secret_id, token).await?,
            RotationStep::SetSecret => self.set_secret(secret_id, token).await?,
            RotationStep::TestSecret => self.test_secret(secret_id, token).await?,
            RotationStep::FinishSecret => self.finish_secret(secret_id, token).await?,
        }

        info!(secret_id = %secret_id, token = %token, step = %step, "Rotation step executed");
        Ok(RotationOutcome::StepExecuted)
    }

    async fn create_secret(&self, secret_id: &SecretId, token: &RotationToken) -> RotationResult<()> {
        if self
            .store
            .get_credential::<DatabaseCredential>(secret_id, Stage::Pending, Some(token))
            .await?
            .is_some()
        {
            debug!(secret_id = %secret_id, token = %token, "PENDING version already exists");
            return Ok(());
        }

        let current = self.require_current(secret_id).await?;
        let mode = RotationMode::resolve(secret_id, &current.credential)?;

        let base = match &mode {
            RotationMode::SingleIdentity => current,
            RotationMode::Alternating { target } => {
                let mut previous = self.require_previous_for(secret_id, target).await?;
                if previous.credential.identity_pool.is_empty() {
                    previous.credential.identity_pool = current.credential.identity_pool.clone();
                }
                previous
            }
        };

        info!(
            secret_id = %secret_id,
            token = %token,
            username = %base.username(),
            alternating = mode.is_alternating(),
            "Creating PENDING version"
        );
        self.store
            .create_pending_version(secret_id, token, &base)
            .await
    }

    async fn set_secret(&self, secret_id: &SecretId, token: &RotationToken) -> RotationResult<()> {
        let pending = self.require_pending(secret_id, token).await?;
        let current = self.require_current(secret_id).await?;

        match self.database.test_credential(&pending).await {
            Ok(true) => {
                info!(
                    secret_id = %secret_id,
                    token = %token,
                    "Database already accepts PENDING, reconciling linked secrets"
                );
                return self.sync_linked_secrets(secret_id, &pending).await;
            }
            Ok(false) => {}
            Err(e) if e.fault_kind() == FaultKind::Connection => {
                debug!(secret_id = %secret_id, error = %e, "PENDING not yet accepted");
            }
            Err(e) => return Err(e),
        }

        let mode = RotationMode::resolve(secret_id, &current.credential)?;
        let expected = mode.expected_username(&current.credential);
        if pending.username() != expected {
            error!(
                secret_id = %secret_id,
                token = %token,
                pending = %pending.username(),
                expected = %expected,
                "PENDING username does not match the rotation target"
            );
            return Err(RotationError::consistency(
                secret_id.as_str(),
                format!(
                    "pending user '{}' does not match expected user '{}'",
                    pending.username(),
                    expected
                ),
            ));
        }

        let acting = match &mode {
            RotationMode::SingleIdentity => current,
            RotationMode::Alternating { target } => {
                self.require_previous_for(secret_id, target).await?
            }
        };

        if !self.database.test_credential(&acting).await? {
            error!(secret_id = %secret_id, database = %acting.connection_target(), "Acting credential rejected");
            return Err(RotationError::connection(
                ConnectionFailureKind::Authentication,
                acting.connection_target(),
                "database rejected the acting credential",
            ));
        }

        self.database
            .change_password(&acting, pending.password())
            .await?;
        info!(
            secret_id = %secret_id,
            token = %token,
            username = %acting.username(),
            "Applied PENDING password to database"
        );

        self.sync_linked_secrets(secret_id, &pending).await
    }

    async fn test_secret(&self, secret_id: &SecretId, token: &RotationToken) -> RotationResult<()> {
        let pending = self.require_pending(secret_id, token).await?;

        if self.database.test_credential(&pending).await? {
            info!(secret_id = %secret_id, token = %token, "Database accepts PENDING");
            Ok(())
        } else {
            error!(secret_id = %secret_id, token = %token, "Database rejected PENDING");
            Err(RotationError::connection(
                ConnectionFailureKind::Authentication,
                pending.connection_target(),
                "database rejected the pending credential",
            ))
        }
    }

    async fn finish_secret(&self, secret_id: &SecretId, token: &RotationToken) -> RotationResult<()> {
        self.store.promote_pending_to_current(secret_id, token).await
    }

    /// Make every linked proxy secret mirror `changed`, writing only where they differ
    async fn sync_linked_secrets(
        &self,
        secret_id: &SecretId,
        changed: &DatabaseCredential,
    ) -> RotationResult<()> {
        for linked in &changed.linked_secrets {
            if linked == secret_id {
                warn!(secret_id = %secret_id, "Secret lists itself as linked, skipping");
                continue;
            }

            let proxy: Credential = self
                .store
                .get_credential(linked, Stage::Current, None)
                .await?
                .ok_or_else(|| {
                    error!(secret_id = %secret_id, linked = %linked, "Linked secret has no CURRENT version");
                    RotationError::state(linked.as_str(), "linked secret has no CURRENT version")
                })?;

            if proxy.mirrors(&changed.credential) {
                debug!(secret_id = %secret_id, linked = %linked, "Linked secret already in sync");
                continue;
            }

            let mut updated = proxy;
            updated.mirror(&changed.credential);
            let version = self.store.replace_current_credential(linked, &updated).await?;
            info!(
                secret_id = %secret_id,
                linked = %linked,
                token = %version,
                "Linked secret updated"
            );
        }
        Ok(())
    }

    async fn require_current(&self, secret_id: &SecretId) -> RotationResult<DatabaseCredential> {
        self.store
            .get_credential(secret_id, Stage::Current, None)
            .await?
            .ok_or_else(|| {
                error!(secret_id = %secret_id, "No CURRENT version");
                RotationError::state(secret_id.as_str(), "no version is labeled CURRENT")
            })
    }

    async fn require_pending(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
    ) -> RotationResult<DatabaseCredential> {
        self.store
            .get_credential(secret_id, Stage::Pending, Some(token))
            .await?
            .ok_or_else(|| {
                error!(secret_id = %secret_id, token = %token, "No PENDING value for token");
                RotationError::state(
                    secret_id.as_str(),
                    format!("no PENDING value stored for version {}", token),
                )
            })
    }

    /// `PREVIOUS`, which in alternating mode must belong to `target`
    async fn require_previous_for(
        &self,
        secret_id: &SecretId,
        target: &str,
    ) -> RotationResult<DatabaseCredential> {
        let previous: Option<DatabaseCredential> = self
            .store
            .get_credential(secret_id, Stage::Previous, None)
            .await?;

        match previous {
            Some(previous) if previous.username() == target => Ok(previous),
            Some(previous) => {
                error!(
                    secret_id = %secret_id,
                    previous = %previous.username(),
                    rotation_target = %target,
                    "PREVIOUS belongs to another identity"
                );
                Err(RotationError::consistency(
                    secret_id.as_str(),
                    format!(
                        "previous user '{}' does not match rotation target '{}'",
                        previous.username(),
                        target
                    ),
                ))
            }
            None => {
                error!(secret_id = %secret_id, rotation_target = %target, "No PREVIOUS version for alternating rotation");
                Err(RotationError::consistency(
                    secret_id.as_str(),
                    format!("no PREVIOUS version holds the password of '{}'", target),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RotationConfig;
    use crate::credential::Password;
    use crate::store::{
        InMemorySecretBackend, SecretAdministration, SecretBackend, StagedCredentialStore,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Accepts whatever password was last set per user
    #[derive(Default)]
    struct RecordingDatabase {
        passwords: Mutex<HashMap<String, String>>,
    }

    impl RecordingDatabase {
        fn with_user(self, username: &str, password: &str) -> Self {
            self.passwords
                .lock()
                .unwrap()
                .insert(username.to_string(), password.to_string());
            self
        }
    }

    #[async_trait]
    impl DatabaseCredentialService for RecordingDatabase {
        async fn test_credential(&self, credential: &DatabaseCredential) -> RotationResult<bool> {
            let passwords = self.passwords.lock().unwrap();
            match passwords.get(credential.username()) {
                Some(password) if password == credential.password().expose_secret() => Ok(true),
                _ => Err(RotationError::connection(
                    ConnectionFailureKind::Authentication,
                    credential.connection_target(),
                    "password authentication failed",
                )),
            }
        }

        async fn change_password(
            &self,
            acting: &DatabaseCredential,
            new_password: &Password,
        ) -> RotationResult<()> {
            self.passwords.lock().unwrap().insert(
                acting.username().to_string(),
                new_password.expose_secret().to_string(),
            );
            Ok(())
        }
    }

    fn id() -> SecretId {
        SecretId::parse("db/app").unwrap()
    }

    fn token() -> RotationToken {
        RotationToken::parse("tok1").unwrap()
    }

    async fn orchestrator(
        enabled: bool,
    ) -> (
        RotationOrchestrator<StagedCredentialStore<InMemorySecretBackend>, RecordingDatabase>,
        InMemorySecretBackend,
    ) {
        let backend = InMemorySecretBackend::new();
        let payload = json!({
            "username": "svc",
            "password": "p0",
            "database_host": "db.internal",
            "database_port": 5432,
            "database_name": "app"
        });
        backend
            .create_secret(&id(), &payload.to_string(), enabled)
            .await
            .unwrap();
        backend.start_rotation(&id(), &token()).await.unwrap();

        let store = StagedCredentialStore::new(backend.clone(), &RotationConfig::default()).unwrap();
        let database = RecordingDatabase::default().with_user("svc", "p0");
        (RotationOrchestrator::new(store, database), backend)
    }

    #[tokio::test]
    async fn test_full_single_identity_cycle() {
        let (orchestrator, backend) = orchestrator(true).await;

        for step in RotationStep::ALL {
            let outcome = orchestrator.rotate(step, &id(), &token()).await.unwrap();
            assert_eq!(outcome, RotationOutcome::StepExecuted, "step {}", step);
        }

        let description = backend.describe_secret(&id()).await.unwrap();
        assert_eq!(description.holders(Stage::Current), vec![&token()]);

        let current: DatabaseCredential = orchestrator
            .store()
            .get_credential(&id(), Stage::Current, None)
            .await
            .unwrap()
            .unwrap();
        assert!(orchestrator.database().test_credential(&current).await.unwrap());
    }

    #[tokio::test]
    async fn test_disabled_rotation_does_nothing() {
        let (orchestrator, backend) = orchestrator(false).await;

        let outcome = orchestrator
            .rotate(RotationStep::CreateSecret, &id(), &token())
            .await
            .unwrap();

        assert_eq!(outcome, RotationOutcome::NothingToRotate);
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_replay_after_finish_is_nothing_to_rotate() {
        let (orchestrator, _) = orchestrator(true).await;
        for step in RotationStep::ALL {
            orchestrator.rotate(step, &id(), &token()).await.unwrap();
        }

        let outcome = orchestrator
            .rotate(RotationStep::FinishSecret, &id(), &token())
            .await
            .unwrap();
        assert_eq!(outcome, RotationOutcome::NothingToRotate);
    }

    #[tokio::test]
    async fn test_set_before_create_is_state_fault() {
        let (orchestrator, _) = orchestrator(true).await;

        let error = orchestrator
            .rotate(RotationStep::SetSecret, &id(), &token())
            .await
            .unwrap_err();
        assert_eq!(error.fault_kind(), FaultKind::State);
    }

    #[tokio::test]
    async fn test_handle_delegates_to_rotate() {
        let (orchestrator, _) = orchestrator(true).await;
        let request = RotationRequest::parse("create_secret", "db/app", "tok1").unwrap();

        let outcome = orchestrator.handle(request).await.unwrap();
        assert_eq!(outcome, RotationOutcome::StepExecuted);
    }
}
