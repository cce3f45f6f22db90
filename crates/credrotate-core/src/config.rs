//! Rotation configuration
//!
//! Loaded from TOML by the CLI; every field has a default so an empty
//! document is a valid configuration.
//!
//! ```rust
//! use credrotate_core::config::RotationConfig;
//!
//! let config = RotationConfig::from_toml_str(r#"
//!     metadata_cache_capacity = 10
//!
//!     [password]
//!     length = 40
//! "#).unwrap();
//!
//! assert_eq!(config.metadata_cache_capacity, 10);
//! assert_eq!(config.password.length, 40);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::password::PasswordPolicy;

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for the staged credential store and password generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Secrets whose staging metadata is cached per process
    pub metadata_cache_capacity: usize,
    pub password: PasswordPolicy,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            metadata_cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
            password: PasswordPolicy::default(),
        }
    }
}

impl RotationConfig {
    pub const DEFAULT_CACHE_CAPACITY: usize = 20;
    pub const MAX_CACHE_CAPACITY: usize = 100;

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=Self::MAX_CACHE_CAPACITY).contains(&self.metadata_cache_capacity) {
            return Err(ConfigError::OutOfRange {
                field: "metadata_cache_capacity",
                value: self.metadata_cache_capacity,
                min: 1,
                max: Self::MAX_CACHE_CAPACITY,
            });
        }

        self.password.validate()
    }
}
