use credrotate_core::error::{BackendError, BackendResult};
use credrotate_core::{
    Credential, CredentialPayload, DatabaseCredential, Password, RotationToken,
    SecretAdministration, SecretId, Stage,
};

pub const DATABASE_HOST: &str = "db.internal";
pub const DATABASE_PORT: u16 = 5432;
pub const DATABASE_NAME: &str = "app";

/// Panics on an invalid id
pub fn secret_id(value: &str) -> SecretId {
    match SecretId::parse(value) {
        Ok(id) => id,
        Err(e) => panic!("invalid fixture secret id '{}': {}", value, e),
    }
}

/// Panics on an invalid token
pub fn token(value: &str) -> RotationToken {
    match RotationToken::parse(value) {
        Ok(token) => token,
        Err(e) => panic!("invalid fixture token '{}': {}", value, e),
    }
}

/// Database credential pointing at the fixture database
pub fn database_credential(username: &str, password: &str) -> DatabaseCredential {
    DatabaseCredential::new(
        Credential::new(username, Password::new(password)),
        DATABASE_HOST,
        DATABASE_PORT,
        DATABASE_NAME,
    )
}

/// `(current, previous)` for a blue/green secret alternating between two users
pub fn blue_green_pair(
    current: (&str, &str),
    previous: (&str, &str),
) -> (DatabaseCredential, DatabaseCredential) {
    let pool = [current.0, previous.0];
    let mut serving = database_credential(current.0, current.1);
    serving.credential.identity_pool = pool.iter().map(|name| name.to_string()).collect();
    let mut peer = database_credential(previous.0, previous.1);
    peer.credential.identity_pool = serving.credential.identity_pool.clone();
    (serving, peer)
}

/// Proxy secret payload mirroring `username`/`password`
pub fn proxy_credential(username: &str, password: &str) -> Credential {
    Credential::new(username, Password::new(password))
        .with_extra("engine", serde_json::Value::from("postgres"))
}

fn encode<C: CredentialPayload>(backend: credrotate_core::BackendKind, credential: &C) -> BackendResult<String> {
    serde_json::to_string(credential).map_err(|e| BackendError::Serialization {
        backend,
        details: e.to_string(),
    })
}

/// Create a secret whose `CURRENT` version is `current`
pub async fn seed_secret<B, C>(
    backend: &B,
    secret_id: &SecretId,
    current: &C,
    rotation_enabled: bool,
) -> BackendResult<RotationToken>
where
    B: SecretAdministration,
    C: CredentialPayload,
{
    let payload = encode(backend.kind(), current)?;
    backend
        .create_secret(secret_id, &payload, rotation_enabled)
        .await
}

/// Store an additional version with explicit stages
pub async fn seed_version<B, C>(
    backend: &B,
    secret_id: &SecretId,
    token: &RotationToken,
    credential: &C,
    stages: &[Stage],
) -> BackendResult<()>
where
    B: SecretAdministration,
    C: CredentialPayload,
{
    let payload = encode(backend.kind(), credential)?;
    backend
        .put_version(secret_id, token, &payload, stages)
        .await
}

/// Register a fresh token as `PENDING`, as a rotation scheduler does
pub async fn begin_rotation<B>(backend: &B, secret_id: &SecretId) -> BackendResult<RotationToken>
where
    B: SecretAdministration,
{
    let token = RotationToken::generate();
    backend.start_rotation(secret_id, &token).await?;
    Ok(token)
}
