//! Live database credential operations

use async_trait::async_trait;

use crate::credential::{DatabaseCredential, Password};
use crate::error::RotationResult;

/// Access to the database whose user passwords are rotated
///
/// Implementations never decide which stage is authoritative; they only
/// report whether a credential works and apply password changes.
#[async_trait]
pub trait DatabaseCredentialService: Send + Sync {
    /// Log in with `credential`
    ///
    /// Authentication and network failures are `Connection` faults carrying
    /// the matching [`ConnectionFailureKind`](crate::error::ConnectionFailureKind).
    async fn test_credential(&self, credential: &DatabaseCredential) -> RotationResult<bool>;

    /// Log in as `acting` and set that same user's password to `new_password`
    ///
    /// A login failure is a `Connection` fault; a refused change after a
    /// successful login is `PasswordChangeRejected`.
    async fn change_password(
        &self,
        acting: &DatabaseCredential,
        new_password: &Password,
    ) -> RotationResult<()>;
}
