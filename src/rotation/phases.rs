//! The four step handlers.
//!
//! Every handler converges when re-run after a partial failure: a step that
//! finds its work already done returns [`PhaseOutcome::Unchanged`].

use super::{PhaseOutcome, RotationCoordinator, RotationError};
use crate::auth::AuthSession;
use crate::logging::redact_secret;
use crate::store::{StoreError, VersionSelector, VersionStage};
use tracing::{debug, info};

impl RotationCoordinator {
    /// Log in with the stored credentials, failing if the login is unknown.
    async fn authenticate(&self) -> Result<AuthSession, RotationError> {
        let login = self.login_credentials().await?;
        self.auth
            .register(&login)
            .await?
            .ok_or(RotationError::AuthRegistration {
                username: login.username,
            })
    }

    /// Ensure the pending version holds a freshly minted token.
    pub(super) async fn create_secret(
        &self,
        secret_id: &str,
        token: &str,
    ) -> Result<PhaseOutcome, RotationError> {
        self.store
            .get_secret_value(secret_id, &VersionSelector::stage(VersionStage::Current))
            .await
            .map_err(|source| match source {
                StoreError::NotFound(_) => RotationError::MissingCurrent {
                    secret_id: secret_id.to_string(),
                    source,
                },
                other => RotationError::Store(other),
            })?;

        let pending = VersionSelector::version_and_stage(token, VersionStage::Pending);
        if self.store.find_secret_value(secret_id, &pending).await?.is_some() {
            info!("Pending value for {secret_id} version {token} already exists");
            return Ok(PhaseOutcome::Unchanged);
        }

        let session = self.authenticate().await?;
        let api_token = self
            .auth
            .get_api_token(&session, session.user.api_level)
            .await?;
        debug!("Minted token {}", redact_secret(&api_token));

        info!("Setting new pending value for {secret_id} version {token}");
        self.store
            .put_secret_value(secret_id, token, &api_token, &[VersionStage::Pending])
            .await?;
        Ok(PhaseOutcome::Changed)
    }

    /// The auth service accepts a token when it is minted, so there is
    /// nothing to install.
    pub(super) async fn set_secret(
        &self,
        secret_id: &str,
        token: &str,
    ) -> Result<PhaseOutcome, RotationError> {
        debug!("No install step for {secret_id} version {token}");
        Ok(PhaseOutcome::Unchanged)
    }

    /// Prove the pending token is the live one and works against the API.
    pub(super) async fn test_secret(
        &self,
        secret_id: &str,
        token: &str,
    ) -> Result<PhaseOutcome, RotationError> {
        let session = self.authenticate().await?;

        let validation = self.auth.validate_api_token(&session);
        if !validation.is_valid {
            return Err(RotationError::TokenInvalid {
                reason: validation
                    .reason
                    .unwrap_or_else(|| "rejected by auth client".to_string()),
            });
        }

        let pending = self
            .store
            .get_secret_value(
                secret_id,
                &VersionSelector::version_and_stage(token, VersionStage::Pending),
            )
            .await?;

        if session.api_token() != Some(pending.secret_string.as_str()) {
            return Err(RotationError::TokenMismatch {
                secret_id: secret_id.to_string(),
                version_id: token.to_string(),
            });
        }

        let address = session
            .user
            .account_address
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| RotationError::ProbeValidation {
                detail: "auth service returned no linked account".to_string(),
                source: None,
            })?;

        let report = self
            .probe
            .check_account(address, &pending.secret_string)
            .await
            .map_err(|e| RotationError::ProbeValidation {
                detail: e.to_string(),
                source: Some(e),
            })?;
        if !report.ok {
            return Err(RotationError::ProbeValidation {
                detail: report.detail,
                source: None,
            });
        }

        info!(
            "Pending token for {secret_id} version {token} verified via {}: {}",
            self.probe.name(),
            report.detail
        );
        Ok(PhaseOutcome::Verified)
    }

    /// Move `AWSCURRENT` onto the pending version in one store call.
    pub(super) async fn finish_secret(
        &self,
        secret_id: &str,
        token: &str,
    ) -> Result<PhaseOutcome, RotationError> {
        let metadata = self.store.describe_secret(secret_id).await?;
        let current = metadata.version_with_stage(&VersionStage::Current);

        if current == Some(token) {
            info!("Secret {secret_id} version {token} already tagged as current");
            return Ok(PhaseOutcome::Unchanged);
        }

        self.store
            .update_version_stage(secret_id, &VersionStage::Current, token, current)
            .await?;
        info!(
            "Rotation of {secret_id} finished: {} moved from {} to {token}",
            VersionStage::Current,
            current.unwrap_or("<none>")
        );
        Ok(PhaseOutcome::Changed)
    }
}
