use async_trait::async_trait;
use credrotate_core::{
    ConnectionFailureKind, DatabaseCredential, DatabaseCredentialService, Password, RotationError,
    RotationResult,
};
use tokio_postgres::error::SqlState;
use std::fmt;
use tokio_postgres::{Client, Error as PgError};
use tokio_postgres_rustls::MakeRustlsConnect;
use zeroize::Zeroizing;

use super::config::{PostgresSettings, build_pg_config};
use super::tls::{TlsSetupError, make_tls_connector};

/// [`DatabaseCredentialService`] for PostgreSQL
///
/// Password changes are self-service: the acting user connects with its own
/// credential and alters its own role. Every connection is encrypted.
#[derive(Clone)]
pub struct PostgresCredentialService {
    settings: PostgresSettings,
    tls: MakeRustlsConnect,
}

impl fmt::Debug for PostgresCredentialService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCredentialService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PostgresCredentialService {
    /// Fails when the TLS trust roots cannot be loaded
    pub fn new(settings: PostgresSettings) -> Result<Self, TlsSetupError> {
        let tls = make_tls_connector(&settings)?;
        Ok(Self { settings, tls })
    }

    pub fn settings(&self) -> &PostgresSettings {
        &self.settings
    }

    async fn connect(&self, credential: &DatabaseCredential) -> RotationResult<Client> {
        let (client, connection) = build_pg_config(credential, &self.settings)
            .connect(self.tls.clone())
            .await
            .map_err(|e| {
                let kind = failure_kind(e.code());
                tracing::error!(
                    target_db = %credential.connection_target(),
                    ssl_mode = %self.settings.ssl_mode,
                    kind = %kind,
                    "PostgreSQL connection failed"
                );
                RotationError::connection(kind, credential.connection_target(), sanitize_error(&e))
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %sanitize_error(&e), "PostgreSQL connection error");
            }
        });

        Ok(client)
    }
}

#[async_trait]
impl DatabaseCredentialService for PostgresCredentialService {
    async fn test_credential(&self, credential: &DatabaseCredential) -> RotationResult<bool> {
        let client = self.connect(credential).await?;

        client.query_one("SELECT 1", &[]).await.map_err(|e| {
            RotationError::connection(
                ConnectionFailureKind::Network,
                credential.connection_target(),
                sanitize_error(&e),
            )
        })?;

        tracing::debug!(target_db = %credential.connection_target(), "Credential accepted");
        Ok(true)
    }

    async fn change_password(
        &self,
        acting: &DatabaseCredential,
        new_password: &Password,
    ) -> RotationResult<()> {
        let client = self.connect(acting).await?;
        let rejected = |e: PgError| {
            tracing::error!(username = %acting.username(), "Password change rejected");
            RotationError::PasswordChangeRejected {
                username: acting.username().to_string(),
                reason: sanitize_error(&e),
            }
        };

        let username = acting.username();
        let password = new_password.expose_secret();

        // Quoting happens server-side; the statement text never passes through client formatting
        let row = client
            .query_one(
                "SELECT format('ALTER ROLE %I WITH PASSWORD %L', $1::text, $2::text)",
                &[&username, &password],
            )
            .await
            .map_err(rejected)?;
        let statement: Zeroizing<String> = Zeroizing::new(row.try_get(0).map_err(rejected)?);

        client.batch_execute(&statement).await.map_err(rejected)?;

        tracing::info!(username = %username, "Password changed");
        Ok(())
    }
}

/// SQLSTATE class 28 (invalid authorization) means the server refused the login
fn failure_kind(code: Option<&SqlState>) -> ConnectionFailureKind {
    match code {
        Some(code) if code.code().starts_with("28") => ConnectionFailureKind::Authentication,
        _ => ConnectionFailureKind::Network,
    }
}

/// Sanitize PostgreSQL errors so no server text reaches faults or logs
fn sanitize_error(error: &PgError) -> String {
    if let Some(code) = error.code() {
        if code.code().starts_with("28") {
            return format!("Authentication failed (SQLSTATE {})", code.code());
        }
        return format!("Database operation failed (SQLSTATE {})", code.code());
    }

    let message = error.to_string();
    if message.contains("timeout") || message.contains("timed out") {
        "Operation timed out".to_string()
    } else if message.contains("connection") {
        "Connection failed".to_string()
    } else {
        "Database error occurred".to_string()
    }
}
