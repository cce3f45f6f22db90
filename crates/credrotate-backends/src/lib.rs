//! # Credrotate Backends
//!
//! Concrete secret store and database implementations for Credrotate.
//!
//! ## Backends
//!
//! - **[FileSecretBackend]**: Persistent JSON-file secret store
//! - **[PostgresCredentialService]**: PostgreSQL password test and change
//!   (requires `postgres` feature)
//!
//! Note: `InMemorySecretBackend` is available in `credrotate-core`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use credrotate_backends::FileSecretBackend;
//! use credrotate_core::{RotationConfig, StagedCredentialStore};
//!
//! let backend = FileSecretBackend::open("secrets.json").unwrap();
//! let store = StagedCredentialStore::new(backend, &RotationConfig::default()).unwrap();
//! # let _ = store;
//! ```

mod file;
pub use file::FileSecretBackend;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub use postgres::{PostgresCredentialService, PostgresSettings, SslMode, TlsSetupError};
