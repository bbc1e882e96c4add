//! Offline dry run of a full rotation.
//!
//! Seeds an in-memory store with a secret and its login secret, then drives
//! all four steps through the coordinator against the in-process auth
//! service, the same way the scheduler would.

use super::{PhaseOutcome, RotationCoordinator, RotationError, RotationEvent, RotationStep};
use crate::auth::{AuthClient, LocalAuthService, LoginCredentials};
use crate::config::Config;
use crate::probe::{StaticProbe, ValidationProbe};
use crate::store::{MemorySecretStore, SecretMetadata, SecretStore};
use std::sync::Arc;
use tracing::info;

const SIMULATED_ACCOUNT: &str = "bitcoincash:qzsimulatedaccount";
const SIMULATED_API_LEVEL: u32 = 40;

#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub secret_id: String,
    /// Make the validation probe reject the token.
    pub fail_probe: bool,
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub request_token: String,
    pub steps: Vec<(RotationStep, PhaseOutcome)>,
    pub before: SecretMetadata,
    pub after: SecretMetadata,
}

/// Run create → set → test → finish for one rotation attempt.
///
/// Stops at the first failing step, like the scheduler does.
pub async fn run_simulation(options: &SimulationOptions) -> Result<SimulationReport, RotationError> {
    let login_secret = login_secret_id(&options.secret_id);
    let login = LoginCredentials {
        username: "rotator@example.com".to_string(),
        password: uuid::Uuid::new_v4().to_string(),
    };
    let login_json = serde_json::to_string(&login).map_err(|source| RotationError::Credentials {
        secret_id: login_secret.clone(),
        source,
    })?;

    let store = Arc::new(MemorySecretStore::new());
    store.create_secret(&login_secret, &login_json, false);

    let auth = Arc::new(
        LocalAuthService::new(uuid::Uuid::new_v4().as_bytes())
            .with_user(&login, SIMULATED_API_LEVEL, SIMULATED_ACCOUNT),
    );

    // The secret starts out holding a token minted before the rotation.
    let session = auth
        .register(&login)
        .await?
        .ok_or_else(|| RotationError::AuthRegistration {
            username: login.username.clone(),
        })?;
    let initial = auth.get_api_token(&session, SIMULATED_API_LEVEL).await?;
    store.create_secret(&options.secret_id, &initial, true);

    let request_token = uuid::Uuid::new_v4().to_string();
    store.begin_rotation(&options.secret_id, &request_token)?;
    let before = store.describe_secret(&options.secret_id).await?;

    let probe: Arc<dyn ValidationProbe> = if options.fail_probe {
        Arc::new(StaticProbe::failing())
    } else {
        Arc::new(StaticProbe::passing())
    };

    let mut config = Config::default();
    config.auth.credentials_secret_id = login_secret;
    let coordinator = RotationCoordinator::new(&config, store.clone(), auth, probe);

    let mut steps = Vec::with_capacity(RotationStep::ALL.len());
    for step in RotationStep::ALL {
        let event = RotationEvent::new(&options.secret_id, &request_token, step);
        let outcome = coordinator.handle(&event).await?;
        steps.push((step, outcome));
    }

    let after = store.describe_secret(&options.secret_id).await?;
    info!(
        "Simulated rotation of {} completed with {} store writes",
        options.secret_id,
        store.mutation_count()
    );

    Ok(SimulationReport {
        request_token,
        steps,
        before,
        after,
    })
}

/// Sibling secret holding the simulated login; never equal to `secret_id`.
fn login_secret_id(secret_id: &str) -> String {
    format!("{secret_id}/auth-login")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VersionStage;

    #[tokio::test]
    async fn simulation_promotes_the_new_version() {
        let options = SimulationOptions {
            secret_id: "demo".into(),
            fail_probe: false,
        };
        let report = run_simulation(&options).await.unwrap();

        let outcomes: Vec<PhaseOutcome> = report.steps.iter().map(|(_, o)| *o).collect();
        assert_eq!(
            outcomes,
            [
                PhaseOutcome::Changed,
                PhaseOutcome::Unchanged,
                PhaseOutcome::Verified,
                PhaseOutcome::Changed
            ]
        );
        assert_eq!(
            report.after.version_with_stage(&VersionStage::Current),
            Some(report.request_token.as_str())
        );
        assert!(report.after.version_with_stage(&VersionStage::Pending).is_none());
    }

    #[tokio::test]
    async fn failing_probe_stops_before_finish() {
        let options = SimulationOptions {
            secret_id: "demo".into(),
            fail_probe: true,
        };
        let err = run_simulation(&options).await.unwrap_err();
        assert!(matches!(err, RotationError::ProbeValidation { .. }));
    }

    #[tokio::test]
    async fn any_secret_id_keeps_the_login_separate() {
        let options = SimulationOptions {
            secret_id: "simulated/auth-login".into(),
            fail_probe: false,
        };
        let report = run_simulation(&options).await.unwrap();
        assert_eq!(report.steps.len(), RotationStep::ALL.len());
        assert_ne!(login_secret_id(&options.secret_id), options.secret_id);
    }
}
