//! CLI configuration file
//!
//! ```toml
//! store_path = "/var/lib/credrotate/secrets.json"
//!
//! [rotation]
//! metadata_cache_capacity = 20
//!
//! [rotation.password]
//! length = 32
//!
//! [database]
//! connect_timeout_secs = 5
//! application_name = "credrotate"
//! ssl_mode = "verify-full"
//! ca_certificate = "/etc/credrotate/rds-ca.pem"
//! ```

use credrotate_backends::{PostgresSettings, SslMode};
use credrotate_core::{ConfigError, RotationConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CliError;

pub const DEFAULT_CONFIG_PATH: &str = "credrotate.toml";
pub const STORE_PATH_ENV: &str = "CREDROTATE_STORE_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// JSON file backing the secret store
    pub store_path: PathBuf,
    pub rotation: RotationConfig,
    pub database: DatabaseSection,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("secrets.json"),
            rotation: RotationConfig::default(),
            database: DatabaseSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub connect_timeout_secs: u64,
    pub application_name: String,
    /// `require` or `verify-full`
    pub ssl_mode: SslMode,
    pub ca_certificate: Option<PathBuf>,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            application_name: "credrotate".to_string(),
            ssl_mode: SslMode::VerifyFull,
            ca_certificate: None,
        }
    }
}

impl CliConfig {
    /// Load `path`, or the default location when `None`
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = ?path, "No config file, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(CliError::ConfigRead {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, CliError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rotation.validate()?;
        if self.database.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "database.connect_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Environment overrides, looked up through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(store_path) = lookup(STORE_PATH_ENV).filter(|value| !value.is_empty()) {
            self.store_path = PathBuf::from(store_path);
        }
    }

    pub fn postgres_settings(&self) -> PostgresSettings {
        PostgresSettings {
            connect_timeout: Duration::from_secs(self.database.connect_timeout_secs),
            application_name: self.database.application_name.clone(),
            ssl_mode: self.database.ssl_mode,
            ca_certificate: self.database.ca_certificate.clone(),
        }
    }
}
