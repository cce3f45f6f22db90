//! Credential payloads
//!
//! A stored secret is a schema-flexible JSON object. Only `username` and
//! `password` are required; database credentials additionally require the
//! connection coordinates. Every other field belongs to some other consumer
//! of the same secret and is carried through read-modify-write cycles
//! untouched via the flattened `extra` map.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::identifiers::SecretId;

/// A database password
///
/// The value is zeroed on drop and never shows up in `Debug` or `Display`
/// output. Unlike a log-safe secret wrapper it serializes as its plain value,
/// since it is written back into the secret payload it came from.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Password(String);

impl Password {
    /// Wrap a password value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the password for use in a connection or statement
    ///
    /// The exposed value must never be logged or placed in an error message.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Whether the password is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare in constant time
    pub fn constant_time_eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.constant_time_eq(other)
    }
}

impl Eq for Password {}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Serialize for Password {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Password)
    }
}

/// Username/password pair plus the fields owned by other consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: Password,
    /// Identities this secret alternates between (blue/green rotation)
    #[serde(
        default,
        rename = "rotation_usernames",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub identity_pool: Vec<String>,
    /// Unknown fields, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credential {
    /// Create a credential with no identity pool and no extra fields
    pub fn new(username: impl Into<String>, password: Password) -> Self {
        Self {
            username: username.into(),
            password,
            identity_pool: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Declare the identity pool used for alternating rotation
    pub fn with_identity_pool<I, S>(mut self, pool: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity_pool = pool.into_iter().map(Into::into).collect();
        self
    }

    /// Attach an extra field
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Copy username and password from another credential, keeping everything else
    pub fn mirror(&mut self, source: &Credential) {
        self.username = source.username.clone();
        self.password = source.password.clone();
    }

    /// Whether username and password already equal `other`'s
    pub fn mirrors(&self, other: &Credential) -> bool {
        self.username == other.username && self.password.constant_time_eq(&other.password)
    }

    /// Check the semantic constraints serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("field `username` must not be empty".to_string());
        }
        if self.password.is_empty() {
            return Err("field `password` must not be empty".to_string());
        }
        Ok(())
    }
}

/// Credential for a relational database user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseCredential {
    #[serde(flatten)]
    pub credential: Credential,
    pub database_host: String,
    pub database_port: u16,
    pub database_name: String,
    /// Proxy secrets whose username/password must mirror this credential
    #[serde(
        default,
        rename = "linked_secret_ids",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub linked_secrets: Vec<SecretId>,
}

impl DatabaseCredential {
    /// Create a database credential
    pub fn new(
        credential: Credential,
        database_host: impl Into<String>,
        database_port: u16,
        database_name: impl Into<String>,
    ) -> Self {
        Self {
            credential,
            database_host: database_host.into(),
            database_port,
            database_name: database_name.into(),
            linked_secrets: Vec::new(),
        }
    }

    /// Link proxy secrets that must mirror this credential
    pub fn with_linked_secrets(mut self, linked: impl IntoIterator<Item = SecretId>) -> Self {
        self.linked_secrets = linked.into_iter().collect();
        self
    }

    pub fn username(&self) -> &str {
        &self.credential.username
    }

    pub fn password(&self) -> &Password {
        &self.credential.password
    }

    /// `user@host:port/database`, safe for logs and error messages
    pub fn connection_target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.credential.username, self.database_host, self.database_port, self.database_name
        )
    }
}

/// A payload schema the credential store can read and write
pub trait CredentialPayload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn credential(&self) -> &Credential;

    fn credential_mut(&mut self) -> &mut Credential;

    /// Schema checks beyond deserialization
    fn validate(&self) -> Result<(), String> {
        self.credential().validate()
    }
}

impl CredentialPayload for Credential {
    fn credential(&self) -> &Credential {
        self
    }

    fn credential_mut(&mut self) -> &mut Credential {
        self
    }
}

impl CredentialPayload for DatabaseCredential {
    fn credential(&self) -> &Credential {
        &self.credential
    }

    fn credential_mut(&mut self) -> &mut Credential {
        &mut self.credential
    }

    fn validate(&self) -> Result<(), String> {
        self.credential.validate()?;
        if self.database_host.trim().is_empty() {
            return Err("field `database_host` must not be empty".to_string());
        }
        if self.database_name.trim().is_empty() {
            return Err("field `database_name` must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_password_is_redacted_in_debug_output() {
        let credential = Credential::new("admin", Password::new("hunter2"));
        let debug = format!("{:?}", credential);

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_extra_fields_survive_round_trip() {
        let raw = json!({
            "username": "admin",
            "password": "admin",
            "database_host": "localhost",
            "database_port": 5432,
            "database_name": "test",
            "engine": "postgres",
            "nested": {"owner": "team-a"}
        });

        let parsed: DatabaseCredential = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.username(), "admin");
        assert_eq!(parsed.credential.extra.get("engine"), Some(&json!("postgres")));

        let written = serde_json::to_value(&parsed).unwrap();
        assert_eq!(written["nested"], json!({"owner": "team-a"}));
        assert_eq!(written["database_port"], json!(5432));
        assert!(written.get("rotation_usernames").is_none());
        assert!(written.get("linked_secret_ids").is_none());
    }

    #[test]
    fn test_missing_username_is_reported_by_name() {
        let error = serde_json::from_value::<Credential>(json!({"password": "admin"})).unwrap_err();
        assert!(error.to_string().contains("username"));
    }

    #[test]
    fn test_missing_password_is_reported_by_name() {
        let error = serde_json::from_value::<Credential>(json!({"username": "admin"})).unwrap_err();
        assert!(error.to_string().contains("password"));
    }

    #[test]
    fn test_identity_pool_and_links_are_read_from_payload() {
        let raw = json!({
            "username": "svc1",
            "password": "p0",
            "rotation_usernames": ["svc1", "svc2"],
            "database_host": "db.internal",
            "database_port": 5432,
            "database_name": "app",
            "linked_secret_ids": ["proxy/svc1"]
        });

        let parsed: DatabaseCredential = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.credential.identity_pool, vec!["svc1", "svc2"]);
        assert_eq!(parsed.linked_secrets[0].as_str(), "proxy/svc1");
        assert!(parsed.credential.extra.is_empty());
    }

    #[test]
    fn test_mirror_keeps_extra_fields() {
        let mut proxy = Credential::new("svc1", Password::new("old"))
            .with_extra("proxy_endpoint", json!("proxy.internal"));
        let source = Credential::new("svc2", Password::new("new"));

        assert!(!proxy.mirrors(&source));
        proxy.mirror(&source);

        assert!(proxy.mirrors(&source));
        assert_eq!(proxy.extra.get("proxy_endpoint"), Some(&json!("proxy.internal")));
    }

    #[test]
    fn test_empty_password_fails_validation() {
        let credential = Credential::new("admin", Password::new(""));
        assert!(credential.validate().unwrap_err().contains("password"));
    }
}
