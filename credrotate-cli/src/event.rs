//! Rotation event decoding

use credrotate_core::{RotationRequest, RotationResult};
use serde::Deserialize;
use std::path::Path;

use crate::error::CliError;

/// Rotation event as delivered by a secret-store scheduler
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RotationEvent {
    pub step: String,
    pub secret_id: String,
    /// Version token the step operates on
    pub client_request_token: String,
    /// Identifies the caller for cross-account rotation; not used by the steps
    #[serde(default)]
    pub rotation_token: Option<String>,
}

impl RotationEvent {
    pub fn from_json(source: &str) -> Result<Self, CliError> {
        serde_json::from_str(source).map_err(|e| CliError::Event(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CliError::Event(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    pub fn to_request(&self) -> RotationResult<RotationRequest> {
        RotationRequest::parse(&self.step, &self.secret_id, &self.client_request_token)
    }
}
