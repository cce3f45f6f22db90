//! Command implementations

use credrotate_backends::{FileSecretBackend, PostgresCredentialService};
use credrotate_core::{
    DatabaseCredentialService, RotationOrchestrator, RotationOutcome, RotationRequest,
    RotationStep, RotationToken, SecretAdministration, SecretBackend, SecretId,
    StagedCredentialStore,
};
use serde::Serialize;

use crate::config::CliConfig;
use crate::error::CliError;
use crate::event::RotationEvent;

type FileOrchestrator<D> = RotationOrchestrator<StagedCredentialStore<FileSecretBackend>, D>;

/// Orchestrator over the configured file store and PostgreSQL
pub fn build_orchestrator(
    config: &CliConfig,
) -> Result<FileOrchestrator<PostgresCredentialService>, CliError> {
    let backend = FileSecretBackend::open(&config.store_path)?;
    let store = StagedCredentialStore::new(backend, &config.rotation)?;
    let database = PostgresCredentialService::new(config.postgres_settings())?;
    Ok(RotationOrchestrator::new(store, database))
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub step: RotationStep,
    pub secret_id: SecretId,
    pub token: RotationToken,
    pub outcome: RotationOutcome,
}

#[derive(Debug, Serialize)]
pub struct CycleReport {
    pub secret_id: SecretId,
    pub token: RotationToken,
    pub steps: Vec<StepReport>,
}

pub async fn run_request<D: DatabaseCredentialService>(
    orchestrator: &FileOrchestrator<D>,
    request: RotationRequest,
) -> Result<StepReport, CliError> {
    let RotationRequest {
        step,
        secret_id,
        token,
    } = request;
    let outcome = orchestrator.rotate(step, &secret_id, &token).await?;
    Ok(StepReport {
        step,
        secret_id,
        token,
        outcome,
    })
}

pub async fn run_step<D: DatabaseCredentialService>(
    orchestrator: &FileOrchestrator<D>,
    step: &str,
    secret_id: &str,
    token: &str,
) -> Result<StepReport, CliError> {
    let request = RotationRequest::parse(step, secret_id, token)?;
    run_request(orchestrator, request).await
}

pub async fn run_event<D: DatabaseCredentialService>(
    orchestrator: &FileOrchestrator<D>,
    event: &RotationEvent,
) -> Result<StepReport, CliError> {
    run_request(orchestrator, event.to_request()?).await
}

/// Act as the scheduler: register a fresh token and run every step in order
pub async fn run_cycle<D: DatabaseCredentialService>(
    orchestrator: &FileOrchestrator<D>,
    secret_id: &SecretId,
) -> Result<CycleReport, CliError> {
    let token = RotationToken::generate();
    orchestrator
        .store()
        .backend()
        .start_rotation(secret_id, &token)
        .await?;
    tracing::info!(secret_id = %secret_id, token = %token, "Rotation cycle started");

    let mut steps = Vec::with_capacity(RotationStep::ALL.len());
    for step in RotationStep::ALL {
        let request = RotationRequest::new(step, secret_id.clone(), token.clone());
        steps.push(run_request(orchestrator, request).await?);
    }

    Ok(CycleReport {
        secret_id: secret_id.clone(),
        token,
        steps,
    })
}

pub async fn run_status(backend: &FileSecretBackend, secret_id: &SecretId) -> Result<String, CliError> {
    let description = backend.describe_secret(secret_id).await?;
    Ok(serde_json::to_string_pretty(&description)?)
}
