//! Rotation protocol vocabulary: stages, steps, outcomes and requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RotationError, RotationResult};
use crate::identifiers::{RotationToken, SecretId};

/// Role of one secret version in the rotation lifecycle
///
/// For a given secret at most one version carries each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// The credential the database currently accepts
    Current,
    /// The credential being rotated in
    Pending,
    /// The credential that was current before the last promotion
    Previous,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Current, Stage::Pending, Stage::Previous];

    /// Label as understood by the secret store
    pub fn label(self) -> &'static str {
        match self {
            Stage::Current => "CURRENT",
            Stage::Pending => "PENDING",
            Stage::Previous => "PREVIOUS",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The four ordered steps of one rotation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStep {
    /// Create a new pending version of the secret
    CreateSecret,
    /// Apply the pending credential to the database
    SetSecret,
    /// Verify the pending credential against the database
    TestSecret,
    /// Promote the pending version to current
    FinishSecret,
}

impl RotationStep {
    pub const ALL: [RotationStep; 4] = [
        RotationStep::CreateSecret,
        RotationStep::SetSecret,
        RotationStep::TestSecret,
        RotationStep::FinishSecret,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RotationStep::CreateSecret => "create_secret",
            RotationStep::SetSecret => "set_secret",
            RotationStep::TestSecret => "test_secret",
            RotationStep::FinishSecret => "finish_secret",
        }
    }

    /// Parse a step name, failing with an invalid-step fault for unknown values
    pub fn parse(value: &str) -> RotationResult<Self> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == value)
            .ok_or_else(|| RotationError::InvalidStep {
                value: value.to_string(),
            })
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationStep {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Result classification of one orchestrator call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationOutcome {
    /// Guard short-circuited: rotation disabled or version already current
    NothingToRotate,
    /// The step's logic ran to completion
    StepExecuted,
}

impl fmt::Display for RotationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationOutcome::NothingToRotate => write!(f, "nothing_to_rotate"),
            RotationOutcome::StepExecuted => write!(f, "step_executed"),
        }
    }
}

/// One typed invocation of the rotation state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRequest {
    pub step: RotationStep,
    pub secret_id: SecretId,
    pub token: RotationToken,
}

impl RotationRequest {
    pub fn new(step: RotationStep, secret_id: SecretId, token: RotationToken) -> Self {
        Self {
            step,
            secret_id,
            token,
        }
    }

    /// Build a request from the raw strings an adapter decoded
    pub fn parse(step: &str, secret_id: &str, token: &str) -> RotationResult<Self> {
        let step = RotationStep::parse(step)?;
        let secret_id = SecretId::parse(secret_id)
            .map_err(|e| RotationError::validation(secret_id, e.to_string()))?;
        let token = RotationToken::parse(token)
            .map_err(|e| RotationError::validation(secret_id.as_str(), e.to_string()))?;

        Ok(Self::new(step, secret_id, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;
    use rstest::rstest;

    #[rstest]
    #[case("create_secret", RotationStep::CreateSecret)]
    #[case("set_secret", RotationStep::SetSecret)]
    #[case("test_secret", RotationStep::TestSecret)]
    #[case("finish_secret", RotationStep::FinishSecret)]
    fn test_step_parses_wire_name(#[case] raw: &str, #[case] expected: RotationStep) {
        assert_eq!(RotationStep::parse(raw).unwrap(), expected);
        assert_eq!(expected.to_string(), raw);
    }

    #[rstest]
    #[case("")]
    #[case("CREATE_SECRET")]
    #[case("rollback_secret")]
    fn test_unknown_step_is_invalid_step_fault(#[case] raw: &str) {
        let error = RotationStep::parse(raw).unwrap_err();
        assert_eq!(error.fault_kind(), FaultKind::InvalidStep);
    }

    #[test]
    fn test_stage_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Stage::Pending).unwrap(), "\"PENDING\"");
        let parsed: Stage = serde_json::from_str("\"PREVIOUS\"").unwrap();
        assert_eq!(parsed, Stage::Previous);
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RotationOutcome::NothingToRotate).unwrap(),
            "\"nothing_to_rotate\""
        );
    }

    #[test]
    fn test_request_parse_validates_identifiers() {
        let request = RotationRequest::parse("test_secret", "db/app", "tok1").unwrap();
        assert_eq!(request.step, RotationStep::TestSecret);

        let error = RotationRequest::parse("test_secret", "db/app", "").unwrap_err();
        assert_eq!(error.fault_kind(), FaultKind::Validation);

        let error = RotationRequest::parse("bogus", "db/app", "tok1").unwrap_err();
        assert_eq!(error.fault_kind(), FaultKind::InvalidStep);
    }
}
