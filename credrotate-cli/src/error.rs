use credrotate_backends::TlsSetupError;
use credrotate_core::{BackendError, ConfigError, RotationError};
use thiserror::Error;

/// Errors surfaced by CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid rotation event: {0}")]
    Event(String),

    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Tls(#[from] TlsSetupError),

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}
