//! Username rotation strategy
//!
//! Decides which identity a rotation cycle targets. With zero or one known
//! identities the same user simply gets a new password. With a pool of two
//! or more, rotation alternates: the identity *after* the current one has
//! its password refreshed while the current identity keeps serving.

use crate::credential::Credential;
use crate::error::{RotationError, RotationResult};
use crate::identifiers::SecretId;

/// Identity to rotate into next.
///
/// Pure and deterministic. Wraps around at the end of the pool. A current
/// username that is not part of the pool is returned unchanged; callers that
/// need to reject that configuration use [`RotationMode::resolve`].
///
/// ```rust
/// use credrotate_core::strategy::next_username;
///
/// let pool = vec!["user1".to_string(), "user2".to_string(), "user3".to_string()];
/// assert_eq!(next_username("user1", &pool), "user2");
/// assert_eq!(next_username("user3", &pool), "user1");
/// assert_eq!(next_username("solo", &[]), "solo");
/// ```
pub fn next_username<'a>(current: &'a str, known_identities: &'a [String]) -> &'a str {
    if known_identities.len() < 2 {
        return current;
    }

    match known_identities.iter().position(|name| name == current) {
        Some(index) => known_identities[(index + 1) % known_identities.len()].as_str(),
        None => current,
    }
}

/// How the current cycle rotates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationMode {
    /// The serving user's own password is replaced
    SingleIdentity,
    /// The peer identity `target` is refreshed while the serving one is left alone
    Alternating { target: String },
}

impl RotationMode {
    /// Derive the mode from the credential currently labelled `CURRENT`
    pub fn resolve(secret_id: &SecretId, current: &Credential) -> RotationResult<Self> {
        let pool = &current.identity_pool;

        if pool.len() >= 2 && !pool.iter().any(|name| *name == current.username) {
            return Err(RotationError::consistency(
                secret_id.as_str(),
                format!(
                    "current user '{}' is not part of the identity pool {:?}",
                    current.username, pool
                ),
            ));
        }

        let target = next_username(&current.username, pool);
        if target == current.username {
            Ok(RotationMode::SingleIdentity)
        } else {
            Ok(RotationMode::Alternating {
                target: target.to_string(),
            })
        }
    }

    /// Username the pending version must carry
    pub fn expected_username<'a>(&'a self, current: &'a Credential) -> &'a str {
        match self {
            RotationMode::SingleIdentity => current.username.as_str(),
            RotationMode::Alternating { target } => target.as_str(),
        }
    }

    pub fn is_alternating(&self) -> bool {
        matches!(self, RotationMode::Alternating { .. })
    }
}
