use crate::auth::AuthError;
use crate::probe::ProbeError;
use crate::store::StoreError;

/// Every way a rotation step can fail.
///
/// Precondition failures come first, then the `createSecret` and
/// `testSecret` failures. Store and auth transport errors are passed through
/// unchanged. None of these are retried here; the scheduler owns retries.
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("rotation is disabled for secret {secret_id}")]
    RotationDisabled { secret_id: String },

    #[error("secret {secret_id} has no version {version_id}")]
    UnknownVersion {
        secret_id: String,
        version_id: String,
    },

    #[error("secret {secret_id} version {version_id} is not staged as AWSPENDING")]
    NotPending {
        secret_id: String,
        version_id: String,
    },

    #[error("unhandled rotation step '{0}'")]
    UnknownPhase(String),

    #[error("secret {secret_id} has no AWSCURRENT value to rotate from")]
    MissingCurrent {
        secret_id: String,
        #[source]
        source: StoreError,
    },

    #[error("login '{username}' is not registered with the auth service")]
    AuthRegistration { username: String },

    #[error("API token failed validation: {reason}")]
    TokenInvalid { reason: String },

    #[error(
        "pending token of secret {secret_id} version {version_id} does not match the live token held by the auth service"
    )]
    TokenMismatch {
        secret_id: String,
        version_id: String,
    },

    #[error("validation probe rejected the pending token: {detail}")]
    ProbeValidation {
        detail: String,
        #[source]
        source: Option<ProbeError>,
    },

    #[error("login secret {secret_id} is not valid credentials JSON")]
    Credentials {
        secret_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
