use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};

use async_trait::async_trait;
use credrotate_core::error::{BackendError, BackendKind, BackendResult};
use credrotate_core::store::{
    SecretAdministration, SecretBackend, SecretDescription, SecretRecord, SecretTable, StageMove,
};
use credrotate_core::{RotationToken, SecretId, Stage};

const KIND: BackendKind = BackendKind::File;

/// Secret backend persisted to a single JSON file.
///
/// Every write is applied to a copy of the table, written to a temporary
/// file and atomically renamed over the store file. The in-process state is
/// only replaced once the rename succeeded, so a failed write leaves both the
/// file and the backend unchanged.
///
/// # Concurrent File Access
///
/// One process at a time. Two `FileSecretBackend`s pointing at the same path
/// overwrite each other's changes.
pub struct FileSecretBackend {
    path: PathBuf,
    table: RwLock<SecretTable>,
}

impl FileSecretBackend {
    /// Open the store at `path`; a missing file is an empty store
    ///
    /// A file that exists but cannot be parsed is an error rather than a
    /// fresh start, since starting over would drop every stored secret.
    pub fn open(path: impl Into<PathBuf>) -> BackendResult<Self> {
        let path = path.into();
        let table = Self::load(&path)?;
        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> BackendResult<SecretTable> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let table: SecretTable = serde_json::from_str(&contents).map_err(|e| {
                    tracing::error!(path = ?path, error = %e, "Failed to parse secret store JSON");
                    BackendError::Serialization {
                        backend: KIND,
                        details: format!("Failed to parse {}: {}", path.display(), e),
                    }
                })?;
                tracing::debug!(path = ?path, secrets = table.len(), "Loaded secret store");
                Ok(table)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = ?path, "Secret store file not found, starting empty");
                Ok(SecretTable::new())
            }
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "Failed to read secret store");
                Err(BackendError::Io {
                    backend: KIND,
                    details: format!("Failed to read {}: {}", path.display(), e),
                })
            }
        }
    }

    fn persist(&self, table: &SecretTable) -> BackendResult<()> {
        let json = serde_json::to_string_pretty(table).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialize secret store");
            BackendError::Serialization {
                backend: KIND,
                details: format!("Failed to serialize secret store: {}", e),
            }
        })?;

        let tmp_path = self.path.with_extension("tmp");

        fs::write(&tmp_path, json).map_err(|e| {
            tracing::error!(path = ?tmp_path, error = %e, "Failed to write secret store to temporary file");
            BackendError::Io {
                backend: KIND,
                details: format!("Failed to write to {}: {}", tmp_path.display(), e),
            }
        })?;

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            tracing::error!(
                from = ?tmp_path,
                to = ?self.path,
                error = %e,
                "Failed to atomically rename secret store"
            );
            BackendError::Io {
                backend: KIND,
                details: format!(
                    "Failed to rename {} to {}: {}",
                    tmp_path.display(),
                    self.path.display(),
                    e
                ),
            }
        })?;

        tracing::debug!(path = ?self.path, secrets = table.len(), "Persisted secret store");
        Ok(())
    }

    fn read(&self) -> BackendResult<RwLockReadGuard<'_, SecretTable>> {
        self.table
            .read()
            .map_err(|_| BackendError::LockPoisoned { backend: KIND })
    }

    /// Apply `change` to a copy, persist it, then publish it
    ///
    /// `change` returns whether anything changed; unchanged tables are not written.
    fn mutate<R>(
        &self,
        change: impl FnOnce(&mut SecretTable) -> BackendResult<(R, bool)>,
    ) -> BackendResult<R> {
        let mut table = self
            .table
            .write()
            .map_err(|_| BackendError::LockPoisoned { backend: KIND })?;

        let mut staged = table.clone();
        let (result, changed) = change(&mut staged)?;
        if changed {
            self.persist(&staged)?;
            *table = staged;
        }
        Ok(result)
    }
}

#[async_trait]
impl SecretBackend for FileSecretBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn describe_secret(&self, secret_id: &SecretId) -> BackendResult<SecretDescription> {
        self.read()?.describe(KIND, secret_id)
    }

    async fn get_secret_value(
        &self,
        secret_id: &SecretId,
        stage: Stage,
        token: Option<&RotationToken>,
    ) -> BackendResult<Option<String>> {
        self.read()?.value(KIND, secret_id, stage, token)
    }

    async fn put_secret_value(
        &self,
        secret_id: &SecretId,
        token: &RotationToken,
        payload: &str,
        stages: &[Stage],
    ) -> BackendResult<()> {
        self.mutate(|table| {
            let changed = table.put_value(KIND, secret_id, token, payload, stages)?;
            Ok(((), changed))
        })
    }

    async fn move_stages(&self, secret_id: &SecretId, moves: &[StageMove]) -> BackendResult<()> {
        self.mutate(|table| {
            table.move_stages(KIND, secret_id, moves)?;
            Ok(((), true))
        })
    }
}

#[async_trait]
impl SecretAdministration for FileSecretBackend {
    async fn create_secret(
        &self,
        secret_id: &SecretId,
        payload: &str,
        rotation_enabled: bool,
    ) -> BackendResult<RotationToken> {
        self.mutate(|table| {
            let token = table.create(KIND, secret_id, payload, rotation_enabled)?;
            Ok((token, true))
        })
    }

    async fn start_rotation(&self, secret_id: &SecretId, token: &RotationToken) -> BackendResult<()> {
        self.mutate(|table| {
            table.start_rotation(KIND, secret_id, token)?;
            Ok(((), true))
        })
    }

    async fn set_rotation_enabled(&self, secret_id: &SecretId, enabled: bool) -> BackendResult<()> {
        self.mutate(|table| {
            table.set_rotation_enabled(KIND, secret_id, enabled)?;
            Ok(((), true))
        })
    }

    async fn secret_record(&self, secret_id: &SecretId) -> BackendResult<SecretRecord> {
        self.read()?.record(KIND, secret_id).cloned()
    }

    async fn list_secrets(&self) -> BackendResult<Vec<SecretId>> {
        Ok(self.read()?.ids())
    }
}
