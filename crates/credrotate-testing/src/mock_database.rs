use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use credrotate_core::{
    ConnectionFailureKind, DatabaseCredential, DatabaseCredentialService, Password, RotationError,
    RotationResult,
};

/// One recorded call against a [`MockDatabase`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseCall {
    TestCredential { username: String },
    ChangePassword { username: String },
}

#[derive(Default)]
struct MockState {
    users: HashMap<String, String>,
    calls: Vec<DatabaseCall>,
    unreachable: bool,
    rejected_changes: HashSet<String>,
}

/// In-memory database that accepts exactly the last password set per user
///
/// Clones share state, so a test can hand one clone to the orchestrator and
/// inspect another.
#[derive(Clone, Default)]
pub struct MockDatabase {
    state: Arc<Mutex<MockState>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a user with an initial password
    pub fn with_user(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.state()
            .users
            .insert(username.into(), password.into());
        self
    }

    /// Refuse password changes for `username` after a successful login
    pub fn reject_changes_for(self, username: impl Into<String>) -> Self {
        self.state().rejected_changes.insert(username.into());
        self
    }

    /// Simulate a network outage; every call fails with a network fault
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    pub fn password_of(&self, username: &str) -> Option<String> {
        self.state().users.get(username).cloned()
    }

    /// Whether `credential` would log in
    pub fn accepts(&self, credential: &DatabaseCredential) -> bool {
        self.state()
            .users
            .get(credential.username())
            .is_some_and(|stored| stored == credential.password().expose_secret())
    }

    /// Successful password changes so far
    pub fn change_count(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, DatabaseCall::ChangePassword { .. }))
            .count()
    }

    pub fn call_history(&self) -> Vec<DatabaseCall> {
        self.state().calls.clone()
    }

    pub fn reset_history(&self) {
        self.state().calls.clear();
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn login(state: &MockState, credential: &DatabaseCredential) -> RotationResult<()> {
        if state.unreachable {
            return Err(RotationError::connection(
                ConnectionFailureKind::Network,
                credential.connection_target(),
                "connection refused",
            ));
        }

        match state.users.get(credential.username()) {
            Some(stored) if stored == credential.password().expose_secret() => Ok(()),
            _ => Err(RotationError::connection(
                ConnectionFailureKind::Authentication,
                credential.connection_target(),
                "password authentication failed",
            )),
        }
    }
}

#[async_trait]
impl DatabaseCredentialService for MockDatabase {
    async fn test_credential(&self, credential: &DatabaseCredential) -> RotationResult<bool> {
        let mut state = self.state();
        state.calls.push(DatabaseCall::TestCredential {
            username: credential.username().to_string(),
        });
        tracing::debug!(username = %credential.username(), "Mock database login");

        Self::login(&state, credential)?;
        Ok(true)
    }

    async fn change_password(
        &self,
        acting: &DatabaseCredential,
        new_password: &Password,
    ) -> RotationResult<()> {
        let mut state = self.state();
        Self::login(&state, acting)?;

        if state.rejected_changes.contains(acting.username()) {
            return Err(RotationError::PasswordChangeRejected {
                username: acting.username().to_string(),
                reason: "permission denied".to_string(),
            });
        }

        state.users.insert(
            acting.username().to_string(),
            new_password.expose_secret().to_string(),
        );
        state.calls.push(DatabaseCall::ChangePassword {
            username: acting.username().to_string(),
        });
        tracing::debug!(username = %acting.username(), "Mock database password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::database_credential;
    use credrotate_core::FaultKind;

    #[tokio::test]
    async fn test_login_with_known_password() {
        let database = MockDatabase::new().with_user("svc", "p0");

        assert!(database.test_credential(&database_credential("svc", "p0")).await.unwrap());

        let error = database
            .test_credential(&database_credential("svc", "wrong"))
            .await
            .unwrap_err();
        assert!(error.is_authentication_failure());
    }

    #[tokio::test]
    async fn test_change_password_updates_user() {
        let database = MockDatabase::new().with_user("svc", "p0");

        database
            .change_password(&database_credential("svc", "p0"), &Password::new("p1"))
            .await
            .unwrap();

        assert_eq!(database.password_of("svc").as_deref(), Some("p1"));
        assert_eq!(database.change_count(), 1);
        assert_eq!(
            database.call_history(),
            vec![DatabaseCall::ChangePassword {
                username: "svc".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_unreachable_is_network_fault() {
        let database = MockDatabase::new().with_user("svc", "p0");
        database.set_unreachable(true);

        let error = database
            .test_credential(&database_credential("svc", "p0"))
            .await
            .unwrap_err();
        assert_eq!(error.fault_kind(), FaultKind::Connection);
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_rejected_change_keeps_password() {
        let database = MockDatabase::new()
            .with_user("svc", "p0")
            .reject_changes_for("svc");

        let error = database
            .change_password(&database_credential("svc", "p0"), &Password::new("p1"))
            .await
            .unwrap_err();

        assert_eq!(error.fault_kind(), FaultKind::PasswordChangeRejected);
        assert_eq!(database.password_of("svc").as_deref(), Some("p0"));
    }
}
