use super::RotationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trigger payload delivered once per rotation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RotationEvent {
    pub secret_id: String,
    /// Version id of the candidate value.
    pub client_request_token: String,
    /// Raw step name; parsed after the preconditions pass.
    pub step: String,
}

impl RotationEvent {
    pub fn new(secret_id: &str, token: &str, step: RotationStep) -> Self {
        Self {
            secret_id: secret_id.to_string(),
            client_request_token: token.to_string(),
            step: step.as_str().to_string(),
        }
    }
}

/// The four rotation steps, in the order the scheduler runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationStep {
    CreateSecret,
    SetSecret,
    TestSecret,
    FinishSecret,
}

impl RotationStep {
    pub const ALL: [RotationStep; 4] = [
        RotationStep::CreateSecret,
        RotationStep::SetSecret,
        RotationStep::TestSecret,
        RotationStep::FinishSecret,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RotationStep::CreateSecret => "createSecret",
            RotationStep::SetSecret => "setSecret",
            RotationStep::TestSecret => "testSecret",
            RotationStep::FinishSecret => "finishSecret",
        }
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RotationStep {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RotationStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| RotationError::UnknownPhase(s.to_string()))
    }
}

/// What an invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseOutcome {
    /// The version was already `AWSCURRENT`; no step ran.
    AlreadyCurrent,
    /// The step ran and found nothing to do.
    Unchanged,
    /// The step wrote to the store.
    Changed,
    /// The pending token passed every check.
    Verified,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_step_name() {
        for step in RotationStep::ALL {
            assert_eq!(step.as_str().parse::<RotationStep>().unwrap(), step);
        }
    }

    #[test]
    fn step_names_are_case_sensitive() {
        let err = "CreateSecret".parse::<RotationStep>().unwrap_err();
        assert!(matches!(err, RotationError::UnknownPhase(name) if name == "CreateSecret"));
    }

    #[test]
    fn event_uses_trigger_field_names() {
        let event: RotationEvent = serde_json::from_value(json!({
            "SecretId": "arn:aws:secretsmanager:us-east-1:1:secret:jwt",
            "ClientRequestToken": "v2",
            "Step": "testSecret"
        }))
        .unwrap();
        assert_eq!(event.client_request_token, "v2");
        assert_eq!(event.step, "testSecret");
    }
}
