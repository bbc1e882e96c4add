//! Versioned secret storage.
//!
//! A secret is a set of immutable versions, each tagged with zero or more
//! staging labels. Rotation only ever touches the labels through the
//! [`SecretStore`] trait, so the coordinator is agnostic of whether the
//! backend is the managed service, an emulator, or the in-process store.

pub mod http;
pub mod memory;

pub use http::HttpSecretStore;
pub use memory::MemorySecretStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Staging Labels
// ============================================================================

/// A staging label attached to a secret version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VersionStage {
    /// The value clients should use now.
    Current,
    /// The candidate value being rotated in.
    Pending,
    /// The value that was current before the last promotion.
    Previous,
    /// Any caller-defined label.
    Custom(String),
}

impl VersionStage {
    pub fn as_str(&self) -> &str {
        match self {
            VersionStage::Current => "AWSCURRENT",
            VersionStage::Pending => "AWSPENDING",
            VersionStage::Previous => "AWSPREVIOUS",
            VersionStage::Custom(label) => label,
        }
    }

    /// Whether at most one version of a secret may carry this label.
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, VersionStage::Custom(_))
    }
}

impl fmt::Display for VersionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for VersionStage {
    fn from(label: String) -> Self {
        match label.as_str() {
            "AWSCURRENT" => VersionStage::Current,
            "AWSPENDING" => VersionStage::Pending,
            "AWSPREVIOUS" => VersionStage::Previous,
            _ => VersionStage::Custom(label),
        }
    }
}

impl From<&str> for VersionStage {
    fn from(label: &str) -> Self {
        VersionStage::from(label.to_string())
    }
}

impl From<VersionStage> for String {
    fn from(stage: VersionStage) -> Self {
        stage.as_str().to_string()
    }
}

impl FromStr for VersionStage {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(VersionStage::from(s))
    }
}

// ============================================================================
// Store Types
// ============================================================================

/// Version → stage mapping plus the rotation flag of a secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretMetadata {
    pub arn: String,
    pub rotation_enabled: bool,
    pub versions: BTreeMap<String, BTreeSet<VersionStage>>,
}

impl SecretMetadata {
    /// Stages attached to `version_id`, or `None` if the version is unknown.
    pub fn stages_of(&self, version_id: &str) -> Option<&BTreeSet<VersionStage>> {
        self.versions.get(version_id)
    }

    /// The version currently carrying `stage`, if any.
    pub fn version_with_stage(&self, stage: &VersionStage) -> Option<&str> {
        self.versions
            .iter()
            .find(|(_, stages)| stages.contains(stage))
            .map(|(id, _)| id.as_str())
    }
}

/// Selects a version by id, by stage, or both.
///
/// With neither set the store resolves the `AWSCURRENT` version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSelector {
    pub version_id: Option<String>,
    pub stage: Option<VersionStage>,
}

impl VersionSelector {
    pub fn stage(stage: VersionStage) -> Self {
        Self {
            version_id: None,
            stage: Some(stage),
        }
    }

    pub fn version_and_stage(version_id: impl Into<String>, stage: VersionStage) -> Self {
        Self {
            version_id: Some(version_id.into()),
            stage: Some(stage),
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.version_id, &self.stage) {
            (Some(id), Some(stage)) => write!(f, "version {id} at stage {stage}"),
            (Some(id), None) => write!(f, "version {id}"),
            (None, Some(stage)) => write!(f, "stage {stage}"),
            (None, None) => write!(f, "stage {}", VersionStage::Current),
        }
    }
}

/// A stored secret value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub arn: String,
    pub version_id: String,
    pub secret_string: String,
    pub stages: BTreeSet<VersionStage>,
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("arn", &self.arn)
            .field("version_id", &self.version_id)
            .field("secret_string", &crate::logging::redact_secret(&self.secret_string))
            .field("stages", &self.stages)
            .finish()
    }
}

/// Errors returned by a [`SecretStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("invalid store request: {0}")]
    InvalidRequest(String),
    #[error("secret store transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("secret store returned {code}: {message}")]
    Service { code: String, message: String },
}

// ============================================================================
// Store Trait
// ============================================================================

/// Backend holding versioned secrets.
///
/// Implementations must give read-after-write consistency and make
/// [`SecretStore::update_version_stage`] a single atomic operation.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Display name for logging.
    fn name(&self) -> &str;

    /// Fetch the version → stage mapping and the rotation flag.
    async fn describe_secret(&self, secret_id: &str) -> Result<SecretMetadata, StoreError>;

    /// Fetch the value matching `selector`. Fails with
    /// [`StoreError::NotFound`] when no version matches.
    async fn get_secret_value(
        &self,
        secret_id: &str,
        selector: &VersionSelector,
    ) -> Result<SecretValue, StoreError>;

    /// Store `value` as version `version_id` tagged with `stages`.
    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
        value: &str,
        stages: &[VersionStage],
    ) -> Result<(), StoreError>;

    /// Move `stage` onto `move_to`, removing it from `remove_from`.
    async fn update_version_stage(
        &self,
        secret_id: &str,
        stage: &VersionStage,
        move_to: &str,
        remove_from: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Like [`SecretStore::get_secret_value`], but a missing version is
    /// `Ok(None)` rather than an error.
    async fn find_secret_value(
        &self,
        secret_id: &str,
        selector: &VersionSelector,
    ) -> Result<Option<SecretValue>, StoreError> {
        match self.get_secret_value(secret_id, selector).await {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
