//! TLS connector for PostgreSQL connections

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::{self, PemObject};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_postgres_rustls::MakeRustlsConnect;

use super::config::{PostgresSettings, SslMode};

/// Failures building the TLS client configuration
#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("Failed to load CA certificate {path}: {details}")]
    CaCertificate { path: PathBuf, details: String },

    #[error("CA certificate file {0} contains no certificates")]
    NoCertificates(PathBuf),

    #[error("TLS configuration failed: {0}")]
    Config(String),
}

/// Build the connector for `settings.ssl_mode`
pub fn make_tls_connector(settings: &PostgresSettings) -> Result<MakeRustlsConnect, TlsSetupError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsSetupError::Config(e.to_string()))?;

    let config = match settings.ssl_mode {
        SslMode::VerifyFull => builder
            .with_root_certificates(root_store(settings.ca_certificate.as_deref())?)
            .with_no_client_auth(),
        SslMode::Require => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(EncryptOnly { provider }))
            .with_no_client_auth(),
    };

    tracing::debug!(ssl_mode = %settings.ssl_mode, "PostgreSQL TLS connector ready");
    Ok(MakeRustlsConnect::new(config))
}

fn root_store(ca_certificate: Option<&Path>) -> Result<RootCertStore, TlsSetupError> {
    let mut roots = RootCertStore::empty();
    let Some(path) = ca_certificate else {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        return Ok(roots);
    };

    let load_error = |details: String| TlsSetupError::CaCertificate {
        path: path.to_path_buf(),
        details,
    };
    let certificates =
        CertificateDer::pem_file_iter(path).map_err(|e: pem::Error| load_error(e.to_string()))?;
    for certificate in certificates {
        let certificate = certificate.map_err(|e| load_error(e.to_string()))?;
        roots
            .add(certificate)
            .map_err(|e| load_error(e.to_string()))?;
    }

    if roots.is_empty() {
        return Err(TlsSetupError::NoCertificates(path.to_path_buf()));
    }
    Ok(roots)
}

/// `sslmode=require`: accept any server certificate but still check handshake signatures
#[derive(Debug)]
struct EncryptOnly {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for EncryptOnly {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
