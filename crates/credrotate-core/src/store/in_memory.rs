use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    SecretAdministration, SecretBackend, SecretDescription, SecretRecord, SecretTable, StageMove,
};
use crate::error::{BackendError, BackendKind, BackendResult};
use crate::identifiers::{RotationToken, SecretId};
use crate::model::Stage;

/// Process-local secret backend with concurrent access.
///
/// `InMemorySecretBackend` is suited to tests and local dry runs; all data
/// is lost when the process terminates. Clones share the same storage, so a
/// test can keep a handle for inspection after moving one into a store.
///
/// # Example
///
/// ```rust
/// use credrotate_core::identifiers::SecretId;
/// use credrotate_core::model::Stage;
/// use credrotate_core::store::{InMemorySecretBackend, SecretAdministration, SecretBackend};
///
/// # tokio_test::block_on(async {
/// let backend = InMemorySecretBackend::new();
/// let id = SecretId::parse("db/app").unwrap();
/// backend.create_secret(&id, r#"{"username":"svc","password":"p0"}"#, true).await.unwrap();
///
/// let current = backend.get_secret_value(&id, Stage::Current, None).await.unwrap();
/// assert!(current.is_some());
/// # });
/// ```
#[derive(Clone, Default)]
pub struct InMemorySecretBackend {
    table: Arc<RwLock<SecretTable>>,
    writes: Arc<AtomicU64>,
}

impl InMemorySecretBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of effective writes made through [`SecretBackend`]
    ///
    /// Administrative helpers are not counted.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn read(&self) -> BackendResult<RwLockReadGuard<'_, SecretTable>> {
        self.table.read().map_err(|_| BackendError::LockPoisoned {
            backend: BackendKind::InMemory,
        })
    }

    fn write(&self) -> BackendResult<RwLockWriteGuard<'_, SecretTable>> {
        self.table.write().map_err(|_| BackendError::LockPoisoned {
            backend: BackendKind::InMemory,
        })
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl SecretBackend for InMemorySecretBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }

    async fn describe_secret(&self, secret_id: &SecretId) -> BackendResult<SecretDescription> {
        self.read()?.describe(BackendKind::InMemory, secret_id)
    }

    async fn get_secret_value(
        &self,
        secret_id: &SecretId,
        stage: Stage,
        token: Option<&RotationToken>,
    ) -> BackendResult<Option<String>> {
        self.read()?
            .value(BackendKind::InMemory, secret_id, stage, token)
    }

    async fn put_secret_value(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
        payload: &str,
        stages: &[Stage],
    ) -> BackendResult<()> {
        let changed = self
            .write()?
            .put_value(BackendKind::InMemory, secret_id, token, payload, stages)?;
        if changed {
            self.record_write();
        }
        Ok(())
    }

    async fn move_stages(&self, secret_id: &SecretId, moves: &[StageMove]) -> BackendResult<()> {
        self.write()?
            .move_stages(BackendKind::InMemory, secret_id, moves)?;
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl SecretAdministration for InMemorySecretBackend {
    async fn create_secret(
        &self,
        secret_id: &SecretId,
        payload: &str,
        rotation_enabled: bool,
    ) -> BackendResult<RotationToken> {
        self.write()?
            .create(BackendKind::InMemory, secret_id, payload, rotation_enabled)
    }

    async fn start_rotation(&self, secret_id: &SecretId, token: &RotationToken) -> BackendResult<()> {
        self.write()?
            .start_rotation(BackendKind::InMemory, secret_id, token)
    }

    async fn set_rotation_enabled(&self, secret_id: &SecretId, enabled: bool) -> BackendResult<()> {
        self.write()?
            .set_rotation_enabled(BackendKind::InMemory, secret_id, enabled)
    }

    async fn secret_record(&self, secret_id: &SecretId) -> BackendResult<SecretRecord> {
        self.read()?
            .record(BackendKind::InMemory, secret_id)
            .cloned()
    }

    async fn list_secrets(&self) -> BackendResult<Vec<SecretId>> {
        Ok(self.read()?.ids())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> SecretId {
        SecretId::parse("db/app").unwrap()
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let backend = InMemorySecretBackend::new();
        let handle = backend.clone();
        backend.create_secret(&id(), "{}", true).await.unwrap();

        assert_eq!(handle.list_secrets().await.unwrap(), vec![id()]);
    }

    #[tokio::test]
    async fn test_write_count_ignores_noop_puts() {
        let backend = InMemorySecretBackend::new();
        backend.create_secret(&id(), "{}", true).await.unwrap();
        let token = RotationToken::parse("t1").unwrap();

        backend
            .put_secret_value(&id(), &token, "v", &[Stage::Pending])
            .await
            .unwrap();
        backend
            .put_secret_value(&id(), &token, "v", &[Stage::Pending])
            .await
            .unwrap();

        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_admin_helpers_are_not_counted() {
        let backend = InMemorySecretBackend::new();
        backend.create_secret(&id(), "{}", true).await.unwrap();
        backend.set_rotation_enabled(&id(), false).await.unwrap();
        backend
            .start_rotation(&id(), &RotationToken::parse("t1").unwrap())
            .await
            .unwrap();

        assert_eq!(backend.write_count(), 0);
        assert!(!backend.secret_record(&id()).await.unwrap().rotation_enabled);
    }
}
