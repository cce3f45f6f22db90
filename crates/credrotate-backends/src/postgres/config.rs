//! PostgreSQL connection configuration

use credrotate_core::DatabaseCredential;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio_postgres::Config;

/// How the server certificate is checked; both modes encrypt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Encrypt without verifying the server certificate
    Require,
    /// Verify the certificate chain and that it names the database host
    #[default]
    VerifyFull,
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SslMode::Require => f.write_str("require"),
            SslMode::VerifyFull => f.write_str("verify-full"),
        }
    }
}

/// Connection settings shared by every credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresSettings {
    pub connect_timeout: Duration,
    /// Application name for connection identification
    pub application_name: String,
    pub ssl_mode: SslMode,
    /// PEM bundle of trusted CAs; the public web roots when unset
    pub ca_certificate: Option<PathBuf>,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            application_name: "credrotate".to_string(),
            ssl_mode: SslMode::VerifyFull,
            ca_certificate: None,
        }
    }
}

/// Build a tokio_postgres Config logging in as `credential`
///
/// TLS is always required; a server that refuses it fails the connection.
pub fn build_pg_config(credential: &DatabaseCredential, settings: &PostgresSettings) -> Config {
    let mut config = Config::new();
    config
        .host(&credential.database_host)
        .port(credential.database_port)
        .dbname(&credential.database_name)
        .user(credential.username())
        .password(credential.password().expose_secret())
        .application_name(&settings.application_name)
        .connect_timeout(settings.connect_timeout)
        .ssl_mode(tokio_postgres::config::SslMode::Require);
    config
}
