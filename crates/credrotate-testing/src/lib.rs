//! # Credrotate Testing Framework
//!
//! Test doubles and fixtures for exercising rotation end to end without a
//! live database.
//!
//! ## Components
//!
//! - **Mock Database**: In-memory [`DatabaseCredentialService`] with call
//!   history and failure injection
//! - **Fixtures**: Credential builders and secret seeding helpers
//!
//! ## Usage
//!
//! ```rust
//! use credrotate_core::{
//!     InMemorySecretBackend, RotationConfig, RotationOrchestrator, RotationOutcome,
//!     RotationStep, StagedCredentialStore,
//! };
//! use credrotate_testing::{MockDatabase, fixtures};
//!
//! # tokio_test::block_on(async {
//! let backend = InMemorySecretBackend::new();
//! let id = fixtures::secret_id("db/app");
//! let current = fixtures::database_credential("svc", "p0");
//! fixtures::seed_secret(&backend, &id, &current, true).await.unwrap();
//! let token = fixtures::begin_rotation(&backend, &id).await.unwrap();
//!
//! let database = MockDatabase::new().with_user("svc", "p0");
//! let store = StagedCredentialStore::new(backend, &RotationConfig::default()).unwrap();
//! let orchestrator = RotationOrchestrator::new(store, database.clone());
//!
//! for step in RotationStep::ALL {
//!     let outcome = orchestrator.rotate(step, &id, &token).await.unwrap();
//!     assert_eq!(outcome, RotationOutcome::StepExecuted);
//! }
//! assert_eq!(database.change_count(), 1);
//! # });
//! ```
//!
//! [`DatabaseCredentialService`]: credrotate_core::DatabaseCredentialService

/// Credential builders and secret seeding helpers
pub mod fixtures;
/// Mock database for predictable testing
pub mod mock_database;

pub use mock_database::{DatabaseCall, MockDatabase};
