//! PostgreSQL database credential service
//!
//! Each call opens a short-lived connection as the credential under test or
//! as the acting user; no pool is kept since rotation touches the database a
//! handful of times per cycle. Connections always use TLS; `SslMode`
//! picks whether the server certificate is verified.

mod config;
mod service;
mod tls;

pub use config::{PostgresSettings, SslMode, build_pg_config};
pub use service::PostgresCredentialService;
pub use tls::{TlsSetupError, make_tls_connector};
