//! Staging logic on top of a [`SecretBackend`]

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{
    SecretBackend, SecretDescription, StageMove, StagingMetadataCache, VersionedCredentialStore,
};
use crate::config::{ConfigError, RotationConfig};
use crate::credential::{Credential, CredentialPayload, Password};
use crate::error::{BackendError, RotationError, RotationResult};
use crate::identifiers::{RotationToken, SecretId};
use crate::model::Stage;
use crate::password::PasswordPolicy;

/// [`VersionedCredentialStore`] over any [`SecretBackend`]
///
/// Owns the per-process staging metadata cache and the password policy used
/// for new pending versions.
///
/// # Example
///
/// ```rust
/// use credrotate_core::config::RotationConfig;
/// use credrotate_core::store::{InMemorySecretBackend, StagedCredentialStore};
///
/// let backend = InMemorySecretBackend::new();
/// let store = StagedCredentialStore::new(backend.clone(), &RotationConfig::default()).unwrap();
/// assert_eq!(store.password_policy().length, 32);
/// ```
pub struct StagedCredentialStore<B> {
    backend: B,
    cache: StagingMetadataCache,
    password_policy: PasswordPolicy,
}

impl<B: SecretBackend> StagedCredentialStore<B> {
    /// Fails when `config` does not pass [`RotationConfig::validate`]
    pub fn new(backend: B, config: &RotationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            backend,
            cache: StagingMetadataCache::new(config.metadata_cache_capacity),
            password_policy: config.password.clone(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &StagingMetadataCache {
        &self.cache
    }

    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }

    async fn description(&self, secret_id: &SecretId) -> RotationResult<Arc<SecretDescription>> {
        if let Some(cached) = self.cache.get(secret_id).await {
            return Ok(cached);
        }
        let description = self.backend.describe_secret(secret_id).await?;
        Ok(self.cache.insert(description).await)
    }

    /// Bypasses the cache; used before relabeling
    async fn fresh_description(&self, secret_id: &SecretId) -> RotationResult<SecretDescription> {
        self.cache.invalidate(secret_id).await;
        Ok(self.backend.describe_secret(secret_id).await?)
    }

    fn decode<C: CredentialPayload>(
        secret_id: &SecretId,
        stage: Stage,
        raw: &str,
    ) -> RotationResult<C> {
        let payload: C = serde_json::from_str(raw).map_err(|e| {
            error!(secret_id = %secret_id, stage = %stage, "Stored payload is malformed");
            RotationError::validation(secret_id.as_str(), format!("{} payload: {}", stage, e))
        })?;
        payload.validate().map_err(|reason| {
            error!(secret_id = %secret_id, stage = %stage, "Stored payload fails schema checks");
            RotationError::validation(secret_id.as_str(), format!("{} payload: {}", stage, reason))
        })?;
        Ok(payload)
    }

    fn encode<C: CredentialPayload>(&self, credential: &C) -> RotationResult<String> {
        serde_json::to_string(credential).map_err(|e| {
            BackendError::Serialization {
                backend: self.backend.kind(),
                details: e.to_string(),
            }
            .into()
        })
    }

    /// Passwords held by `CURRENT` and `PREVIOUS`, read leniently
    async fn passwords_in_use(&self, secret_id: &SecretId) -> RotationResult<Vec<Password>> {
        let mut in_use = Vec::new();
        for stage in [Stage::Current, Stage::Previous] {
            if let Some(raw) = self.backend.get_secret_value(secret_id, stage, None).await? {
                if let Ok(credential) = serde_json::from_str::<Credential>(&raw) {
                    in_use.push(credential.password);
                }
            }
        }
        Ok(in_use)
    }

    fn sole_current_holder(
        secret_id: &SecretId,
        description: &SecretDescription,
    ) -> RotationResult<Option<RotationToken>> {
        match description.holders(Stage::Current).as_slice() {
            [] => Ok(None),
            [holder] => Ok(Some((*holder).clone())),
            holders => {
                error!(secret_id = %secret_id, count = holders.len(), "Multiple versions labeled CURRENT");
                Err(RotationError::state(
                    secret_id.as_str(),
                    format!("{} versions are labeled CURRENT", holders.len()),
                ))
            }
        }
    }
}

#[async_trait]
impl<B: SecretBackend> VersionedCredentialStore for StagedCredentialStore<B> {
    async fn is_rotation_enabled(&self, secret_id: &SecretId) -> RotationResult<bool> {
        Ok(self.description(secret_id).await?.rotation_enabled)
    }

    async fn get_credential<C: CredentialPayload>(
        &self,
        secret_id: &SecretId,
        stage: Stage,
        token: Option<&RotationToken>,
    ) -> RotationResult<Option<C>> {
        self.backend
            .get_secret_value(secret_id, stage, token)
            .await?
            .map(|raw| Self::decode(secret_id, stage, &raw))
            .transpose()
    }

    async fn ensure_staging_valid(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
    ) -> RotationResult<bool> {
        let description = self.description(secret_id).await?;

        let Some(stages) = description.stages_of(token) else {
            error!(secret_id = %secret_id, token = %token, "Version has no stage for rotation");
            return Err(RotationError::state(
                secret_id.as_str(),
                format!("version {} has no stage for rotation", token),
            ));
        };

        if stages.contains(&Stage::Current) {
            info!(secret_id = %secret_id, token = %token, "Version already set as CURRENT");
            return Ok(false);
        }

        if !stages.contains(&Stage::Pending) {
            error!(secret_id = %secret_id, token = %token, "Version not set as PENDING for rotation");
            return Err(RotationError::state(
                secret_id.as_str(),
                format!("version {} not set as PENDING for rotation", token),
            ));
        }

        Ok(true)
    }

    async fn create_pending_version<C: CredentialPayload>(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
        credential: &C,
    ) -> RotationResult<()> {
        if self
            .backend
            .get_secret_value(secret_id, Stage::Pending, None)
            .await?
            .is_some()
        {
            debug!(secret_id = %secret_id, token = %token, "Pending value already stored");
            return Ok(());
        }

        let in_use = self.passwords_in_use(secret_id).await?;
        let in_use: Vec<&Password> = in_use.iter().collect();

        let mut pending = credential.clone();
        pending.credential_mut().password = self.password_policy.generate_distinct(&in_use);

        let payload = self.encode(&pending)?;
        let result = self
            .backend
            .put_secret_value(secret_id, token, &payload, &[Stage::Pending])
            .await;
        self.cache.invalidate(secret_id).await;
        result?;

        info!(
            secret_id = %secret_id,
            token = %token,
            username = %pending.credential().username,
            "Stored new PENDING version"
        );
        Ok(())
    }

    async fn promote_pending_to_current(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
    ) -> RotationResult<()> {
        let description = self.fresh_description(secret_id).await?;

        if description.stages_of(token).is_none() {
            error!(secret_id = %secret_id, token = %token, "Cannot promote unknown version");
            return Err(RotationError::state(
                secret_id.as_str(),
                format!("version {} does not exist", token),
            ));
        }

        let old_current = Self::sole_current_holder(secret_id, &description)?;
        if old_current.as_ref() == Some(token) {
            info!(secret_id = %secret_id, token = %token, "Version already marked as CURRENT");
            return Ok(());
        }

        let staged = self
            .backend
            .get_secret_value(secret_id, Stage::Pending, Some(token))
            .await?;
        if staged.is_none() {
            error!(secret_id = %secret_id, token = %token, "PENDING version holds no value");
            return Err(RotationError::state(
                secret_id.as_str(),
                format!("version {} has no PENDING value to promote", token),
            ));
        }

        let mut moves = vec![
            StageMove::attach(Stage::Current, token.clone()),
            StageMove::remove(Stage::Pending),
        ];
        moves.push(match &old_current {
            Some(previous) => StageMove::attach(Stage::Previous, previous.clone()),
            None => StageMove::remove(Stage::Previous),
        });

        let result = self.backend.move_stages(secret_id, &moves).await;
        self.cache.invalidate(secret_id).await;
        result?;

        info!(
            secret_id = %secret_id,
            token = %token,
            previous = ?old_current.as_ref().map(RotationToken::as_str),
            "Promoted version to CURRENT"
        );
        Ok(())
    }

    async fn replace_current_credential<C: CredentialPayload>(
        &self,
        secret_id: &SecretId,
        credential: &C,
    ) -> RotationResult<RotationToken> {
        let description = self.fresh_description(secret_id).await?;
        let old_current = Self::sole_current_holder(secret_id, &description)?;

        let token = RotationToken::generate();
        let payload = self.encode(credential)?;

        let mut moves = vec![StageMove::attach(Stage::Current, token.clone())];
        if let Some(previous) = old_current {
            moves.push(StageMove::attach(Stage::Previous, previous));
        }

        let result = match self
            .backend
            .put_secret_value(secret_id, &token, &payload, &[])
            .await
        {
            Ok(()) => self.backend.move_stages(secret_id, &moves).await,
            Err(e) => Err(e),
        };
        self.cache.invalidate(secret_id).await;
        result?;

        info!(secret_id = %secret_id, token = %token, "Replaced CURRENT version");
        Ok(token)
    }

    async fn forget_metadata(&self, secret_id: &SecretId) {
        self.cache.invalidate(secret_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::DatabaseCredential;
    use crate::error::FaultKind;
    use crate::store::{InMemorySecretBackend, SecretAdministration};
    use serde_json::json;

    fn id() -> SecretId {
        SecretId::parse("db/app").unwrap()
    }

    fn token(value: &str) -> RotationToken {
        RotationToken::parse(value).unwrap()
    }

    fn current_payload() -> String {
        json!({
            "username": "svc",
            "password": "p0",
            "database_host": "db.internal",
            "database_port": 5432,
            "database_name": "app",
            "foo": "bar"
        })
        .to_string()
    }

    async fn seeded() -> (StagedCredentialStore<InMemorySecretBackend>, RotationToken) {
        let backend = InMemorySecretBackend::new();
        let current = backend
            .create_secret(&id(), &current_payload(), true)
            .await
            .unwrap();
        let store = StagedCredentialStore::new(backend, &RotationConfig::default()).unwrap();
        (store, current)
    }

    #[tokio::test]
    async fn test_get_credential_reads_current() {
        let (store, _) = seeded().await;
        let credential: DatabaseCredential = store
            .get_credential(&id(), Stage::Current, None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(credential.username(), "svc");
        assert_eq!(credential.database_port, 5432);
        assert_eq!(credential.credential.extra.get("foo"), Some(&json!("bar")));
    }

    #[tokio::test]
    async fn test_get_credential_absent_stage_is_none() {
        let (store, _) = seeded().await;
        let previous: Option<Credential> = store
            .get_credential(&id(), Stage::Previous, None)
            .await
            .unwrap();
        assert!(previous.is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_validation_fault() {
        let backend = InMemorySecretBackend::new();
        backend
            .create_secret(&id(), r#"{"password":"p0"}"#, true)
            .await
            .unwrap();
        let store = StagedCredentialStore::new(backend, &RotationConfig::default()).unwrap();

        let error = store
            .get_credential::<Credential>(&id(), Stage::Current, None)
            .await
            .unwrap_err();
        assert_eq!(error.fault_kind(), FaultKind::Validation);
        assert!(error.to_string().contains("username"));
    }

    #[tokio::test]
    async fn test_ensure_staging_valid_transitions() {
        let (store, current) = seeded().await;
        store.backend().start_rotation(&id(), &token("t1")).await.unwrap();
        store.forget_metadata(&id()).await;

        assert!(!store.ensure_staging_valid(&id(), &current).await.unwrap());
        assert!(store.ensure_staging_valid(&id(), &token("t1")).await.unwrap());

        let unknown = store
            .ensure_staging_valid(&id(), &token("ghost"))
            .await
            .unwrap_err();
        assert_eq!(unknown.fault_kind(), FaultKind::State);
    }

    #[tokio::test]
    async fn test_unlabeled_version_is_state_fault() {
        let (store, _) = seeded().await;
        store
            .backend()
            .put_version(&id(), &token("orphan"), &current_payload(), &[])
            .await
            .unwrap();

        let error = store
            .ensure_staging_valid(&id(), &token("orphan"))
            .await
            .unwrap_err();
        assert_eq!(error.fault_kind(), FaultKind::State);
    }

    #[tokio::test]
    async fn test_create_pending_generates_fresh_password_once() {
        let (store, _) = seeded().await;
        let current: DatabaseCredential = store
            .get_credential(&id(), Stage::Current, None)
            .await
            .unwrap()
            .unwrap();

        store
            .create_pending_version(&id(), &token("t1"), &current)
            .await
            .unwrap();
        let first: DatabaseCredential = store
            .get_credential(&id(), Stage::Pending, Some(&token("t1")))
            .await
            .unwrap()
            .unwrap();

        store
            .create_pending_version(&id(), &token("t1"), &current)
            .await
            .unwrap();
        let second: DatabaseCredential = store
            .get_credential(&id(), Stage::Pending, Some(&token("t1")))
            .await
            .unwrap()
            .unwrap();

        assert_ne!(first.password(), current.password());
        assert_eq!(first.password(), second.password());
        assert_eq!(first.credential.extra.get("foo"), Some(&json!("bar")));
    }

    #[tokio::test]
    async fn test_promotion_relabels_current_and_previous() {
        let (store, current) = seeded().await;
        let credential: DatabaseCredential = store
            .get_credential(&id(), Stage::Current, None)
            .await
            .unwrap()
            .unwrap();
        store
            .create_pending_version(&id(), &token("t1"), &credential)
            .await
            .unwrap();

        store
            .promote_pending_to_current(&id(), &token("t1"))
            .await
            .unwrap();
        store
            .promote_pending_to_current(&id(), &token("t1"))
            .await
            .unwrap();

        let description = store.backend().describe_secret(&id()).await.unwrap();
        assert_eq!(description.holders(Stage::Current), vec![&token("t1")]);
        assert_eq!(description.holders(Stage::Previous), vec![&current]);
        assert!(description.holders(Stage::Pending).is_empty());
    }

    #[tokio::test]
    async fn test_promoting_unfilled_pending_is_state_fault() {
        let (store, current) = seeded().await;
        store.backend().start_rotation(&id(), &token("t1")).await.unwrap();

        let error = store
            .promote_pending_to_current(&id(), &token("t1"))
            .await
            .unwrap_err();
        assert_eq!(error.fault_kind(), FaultKind::State);

        let description = store.backend().describe_secret(&id()).await.unwrap();
        assert_eq!(description.holders(Stage::Current), vec![&current]);
        assert_eq!(description.holders(Stage::Pending), vec![&token("t1")]);
        let still_current: Option<DatabaseCredential> = store
            .get_credential(&id(), Stage::Current, None)
            .await
            .unwrap();
        assert!(still_current.is_some());
    }

    #[test]
    fn test_invalid_password_policy_is_rejected() {
        let config = RotationConfig {
            password: PasswordPolicy {
                exclude_characters: ('!'..='~').collect(),
                ..PasswordPolicy::default()
            },
            ..RotationConfig::default()
        };

        let result = StagedCredentialStore::new(InMemorySecretBackend::new(), &config);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "password.exclude_characters",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_replace_current_credential_keeps_previous() {
        let (store, old_current) = seeded().await;
        let replacement = Credential::new("svc", Password::new("p1"));

        let new_token = store
            .replace_current_credential(&id(), &replacement)
            .await
            .unwrap();

        let description = store.backend().describe_secret(&id()).await.unwrap();
        assert_eq!(description.holders(Stage::Current), vec![&new_token]);
        assert_eq!(description.holders(Stage::Previous), vec![&old_current]);
    }

    #[tokio::test]
    async fn test_metadata_is_cached_until_forgotten() {
        let (store, _) = seeded().await;

        assert!(store.is_rotation_enabled(&id()).await.unwrap());
        store.backend().set_rotation_enabled(&id(), false).await.unwrap();
        assert!(store.is_rotation_enabled(&id()).await.unwrap());

        store.forget_metadata(&id()).await;
        assert!(!store.is_rotation_enabled(&id()).await.unwrap());

        let stats = store.cache().stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }
}
