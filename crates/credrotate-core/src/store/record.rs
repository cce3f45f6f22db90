//! Shared in-process secret data model
//!
//! Both bundled backends keep their secrets in a [`SecretTable`]; the table
//! enforces that each stage is held by at most one version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{SecretDescription, StageMove};
use crate::error::{BackendError, BackendKind, BackendResult};
use crate::identifiers::{RotationToken, SecretId};
use crate::model::Stage;

/// One stored version of a secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVersion {
    pub token: RotationToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default)]
    pub stages: BTreeSet<Stage>,
    pub created_at: DateTime<Utc>,
}

/// All versions of one secret plus its administrative flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub rotation_enabled: bool,
    #[serde(default)]
    pub versions: Vec<SecretVersion>,
}

impl SecretRecord {
    pub fn new(rotation_enabled: bool) -> Self {
        Self {
            rotation_enabled,
            versions: Vec::new(),
        }
    }

    pub fn version(&self, token: &RotationToken) -> Option<&SecretVersion> {
        self.versions.iter().find(|v| &v.token == token)
    }

    /// Version currently holding `stage`
    pub fn holder(&self, stage: Stage) -> Option<&SecretVersion> {
        self.versions.iter().find(|v| v.stages.contains(&stage))
    }

    fn attach(&mut self, stage: Stage, token: &RotationToken) {
        for version in &mut self.versions {
            if &version.token == token {
                version.stages.insert(stage);
            } else {
                version.stages.remove(&stage);
            }
        }
    }

    fn detach(&mut self, stage: Stage) {
        for version in &mut self.versions {
            version.stages.remove(&stage);
        }
    }

    /// Drop payload-less registrations that no longer hold any stage
    fn prune(&mut self) {
        self.versions
            .retain(|v| v.payload.is_some() || !v.stages.is_empty());
    }
}

/// Secrets keyed by id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretTable {
    secrets: BTreeMap<SecretId, SecretRecord>,
}

impl SecretTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> Vec<SecretId> {
        self.secrets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn record(&self, backend: BackendKind, secret_id: &SecretId) -> BackendResult<&SecretRecord> {
        self.secrets
            .get(secret_id)
            .ok_or_else(|| not_found(backend, secret_id))
    }

    fn record_mut(
        &mut self,
        backend: BackendKind,
        secret_id: &SecretId,
    ) -> BackendResult<&mut SecretRecord> {
        self.secrets
            .get_mut(secret_id)
            .ok_or_else(|| not_found(backend, secret_id))
    }

    pub fn describe(
        &self,
        backend: BackendKind,
        secret_id: &SecretId,
    ) -> BackendResult<SecretDescription> {
        let record = self.record(backend, secret_id)?;
        Ok(SecretDescription {
            secret_id: secret_id.clone(),
            rotation_enabled: record.rotation_enabled,
            versions: record
                .versions
                .iter()
                .map(|v| (v.token.clone(), v.stages.clone()))
                .collect(),
        })
    }

    pub fn value(
        &self,
        backend: BackendKind,
        secret_id: &SecretId,
        stage: Stage,
        token: Option<&RotationToken>,
    ) -> BackendResult<Option<String>> {
        let record = self.record(backend, secret_id)?;
        Ok(record
            .holder(stage)
            .filter(|v| token.is_none_or(|t| &v.token == t))
            .and_then(|v| v.payload.clone()))
    }

    /// Returns `true` when the table changed
    pub fn put_value(
        &mut self,
        backend: BackendKind,
        secret_id: &SecretId,
        token: &RotationToken,
        payload: &str,
        stages: &[Stage],
    ) -> BackendResult<bool> {
        let record = self.record_mut(backend, secret_id)?;
        let mut changed = false;

        match record.versions.iter_mut().find(|v| &v.token == token) {
            Some(version) => match &version.payload {
                Some(existing) if existing != payload => {
                    return Err(BackendError::VersionConflict {
                        backend,
                        secret_id: secret_id.to_string(),
                        token: token.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    version.payload = Some(payload.to_string());
                    changed = true;
                }
            },
            None => {
                record.versions.push(SecretVersion {
                    token: token.clone(),
                    payload: Some(payload.to_string()),
                    stages: BTreeSet::new(),
                    created_at: Utc::now(),
                });
                changed = true;
            }
        }

        for stage in stages {
            let already_held = record
                .holder(*stage)
                .is_some_and(|holder| &holder.token == token);
            if !already_held {
                record.attach(*stage, token);
                changed = true;
            }
        }

        if changed {
            record.prune();
        }
        Ok(changed)
    }

    /// Every target is checked before any label moves
    pub fn move_stages(
        &mut self,
        backend: BackendKind,
        secret_id: &SecretId,
        moves: &[StageMove],
    ) -> BackendResult<()> {
        let record = self.record_mut(backend, secret_id)?;

        for target in moves.iter().filter_map(|m| m.to.as_ref()) {
            if record.version(target).is_none() {
                return Err(BackendError::VersionNotFound {
                    backend,
                    secret_id: secret_id.to_string(),
                    token: target.to_string(),
                });
            }
        }

        for stage_move in moves {
            match &stage_move.to {
                Some(token) => record.attach(stage_move.stage, token),
                None => record.detach(stage_move.stage),
            }
        }

        record.prune();
        Ok(())
    }

    pub fn create(
        &mut self,
        backend: BackendKind,
        secret_id: &SecretId,
        payload: &str,
        rotation_enabled: bool,
    ) -> BackendResult<RotationToken> {
        if self.secrets.contains_key(secret_id) {
            return Err(BackendError::SecretExists {
                backend,
                secret_id: secret_id.to_string(),
            });
        }

        let token = RotationToken::generate();
        let mut record = SecretRecord::new(rotation_enabled);
        record.versions.push(SecretVersion {
            token: token.clone(),
            payload: Some(payload.to_string()),
            stages: BTreeSet::from([Stage::Current]),
            created_at: Utc::now(),
        });
        self.secrets.insert(secret_id.clone(), record);
        Ok(token)
    }

    /// Idempotent for a token already registered as `PENDING`
    pub fn start_rotation(
        &mut self,
        backend: BackendKind,
        secret_id: &SecretId,
        token: &RotationToken,
    ) -> BackendResult<()> {
        let record = self.record_mut(backend, secret_id)?;

        if let Some(version) = record.version(token) {
            if version.stages.contains(&Stage::Pending) {
                return Ok(());
            }
            return Err(BackendError::VersionConflict {
                backend,
                secret_id: secret_id.to_string(),
                token: token.to_string(),
            });
        }

        record.versions.push(SecretVersion {
            token: token.clone(),
            payload: None,
            stages: BTreeSet::new(),
            created_at: Utc::now(),
        });
        record.attach(Stage::Pending, token);
        record.prune();
        Ok(())
    }

    pub fn set_rotation_enabled(
        &mut self,
        backend: BackendKind,
        secret_id: &SecretId,
        enabled: bool,
    ) -> BackendResult<()> {
        self.record_mut(backend, secret_id)?.rotation_enabled = enabled;
        Ok(())
    }
}

fn not_found(backend: BackendKind, secret_id: &SecretId) -> BackendError {
    BackendError::SecretNotFound {
        backend,
        secret_id: secret_id.to_string(),
    }
}
