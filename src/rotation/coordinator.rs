//! Precondition checks and step dispatch.
//!
//! Each invocation is stateless: the version → stage mapping is re-read and
//! re-checked before every step, which is what makes redelivered and
//! out-of-order invocations safe.

use super::{PhaseOutcome, RotationError, RotationEvent, RotationStep};
use crate::auth::{AuthClient, FullstackAuthClient, LoginCredentials};
use crate::config::Config;
use crate::probe::{BalanceProbe, ValidationProbe};
use crate::store::{HttpSecretStore, SecretStore, VersionSelector, VersionStage};
use std::sync::Arc;
use tracing::{info, instrument};

/// Result of the precondition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// The version is staged as pending; the step may run.
    Ready,
    /// The version is already current; the step is a no-op.
    AlreadyCurrent,
}

pub struct RotationCoordinator {
    pub(super) store: Arc<dyn SecretStore>,
    pub(super) auth: Arc<dyn AuthClient>,
    pub(super) probe: Arc<dyn ValidationProbe>,
    credentials_secret_id: String,
}

impl RotationCoordinator {
    pub fn new(
        config: &Config,
        store: Arc<dyn SecretStore>,
        auth: Arc<dyn AuthClient>,
        probe: Arc<dyn ValidationProbe>,
    ) -> Self {
        Self {
            store,
            auth,
            probe,
            credentials_secret_id: config.auth.credentials_secret_id.clone(),
        }
    }

    /// Wire up the HTTP-backed store, auth client and probe from `config`.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.http.timeout())
            .build()?;

        let store = HttpSecretStore::new(client.clone(), config.store.resolved_endpoint());
        let auth = FullstackAuthClient::new(client.clone(), config.auth.base_url.clone());
        let probe = BalanceProbe::new(client, config.probe.api_url.clone());

        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(auth),
            Arc::new(probe),
        ))
    }

    /// Run one rotation step to completion.
    #[instrument(skip_all, fields(secret = %event.secret_id, version = %event.client_request_token, step = %event.step))]
    pub async fn handle(&self, event: &RotationEvent) -> Result<PhaseOutcome, RotationError> {
        let secret_id = event.secret_id.as_str();
        let token = event.client_request_token.as_str();

        if self.validate(secret_id, token).await? == Precondition::AlreadyCurrent {
            return Ok(PhaseOutcome::AlreadyCurrent);
        }

        let step: RotationStep = event.step.parse()?;
        let outcome = self.dispatch(step, secret_id, token).await?;
        info!("Step {step} finished: {outcome:?}");
        Ok(outcome)
    }

    /// Check that `token` names a pending version of a rotatable secret.
    pub async fn validate(&self, secret_id: &str, token: &str) -> Result<Precondition, RotationError> {
        let metadata = self.store.describe_secret(secret_id).await?;

        if !metadata.rotation_enabled {
            return Err(RotationError::RotationDisabled {
                secret_id: secret_id.to_string(),
            });
        }

        let stages = metadata
            .stages_of(token)
            .ok_or_else(|| RotationError::UnknownVersion {
                secret_id: secret_id.to_string(),
                version_id: token.to_string(),
            })?;

        if stages.contains(&VersionStage::Current) {
            info!("Secret {secret_id} version {token} is already set as {}", VersionStage::Current);
            return Ok(Precondition::AlreadyCurrent);
        }

        if !stages.contains(&VersionStage::Pending) {
            return Err(RotationError::NotPending {
                secret_id: secret_id.to_string(),
                version_id: token.to_string(),
            });
        }

        Ok(Precondition::Ready)
    }

    /// Run the handler for `step`. Callers must have passed [`Self::validate`].
    pub async fn dispatch(
        &self,
        step: RotationStep,
        secret_id: &str,
        token: &str,
    ) -> Result<PhaseOutcome, RotationError> {
        match step {
            RotationStep::CreateSecret => self.create_secret(secret_id, token).await,
            RotationStep::SetSecret => self.set_secret(secret_id, token).await,
            RotationStep::TestSecret => self.test_secret(secret_id, token).await,
            RotationStep::FinishSecret => self.finish_secret(secret_id, token).await,
        }
    }

    /// Read the auth-service login from its sibling secret.
    pub(super) async fn login_credentials(&self) -> Result<LoginCredentials, RotationError> {
        let value = self
            .store
            .get_secret_value(
                &self.credentials_secret_id,
                &VersionSelector::stage(VersionStage::Current),
            )
            .await?;
        let login = LoginCredentials::from_secret_string(&value.secret_string).map_err(|source| {
            RotationError::Credentials {
                secret_id: self.credentials_secret_id.clone(),
                source,
            }
        })?;
        info!("Retrieved auth-service login, username is {}", login.username);
        Ok(login)
    }
}
