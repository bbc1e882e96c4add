//! In-process secret store.
//!
//! Models the staging rules of the managed service: exclusive labels move
//! between versions, promoting a version to `AWSCURRENT` demotes the old one
//! to `AWSPREVIOUS` and clears `AWSPENDING` from the new one. All state sits
//! behind one lock, so every write is atomic.

use super::{
    SecretMetadata, SecretStore, SecretValue, StoreError, VersionSelector, VersionStage,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
struct StoredVersion {
    /// `None` while the version id is reserved but no value was written yet.
    value: Option<String>,
    stages: BTreeSet<VersionStage>,
}

#[derive(Debug, Default)]
struct StoredSecret {
    rotation_enabled: bool,
    versions: BTreeMap<String, StoredVersion>,
}

impl StoredSecret {
    fn holder_of(&self, stage: &VersionStage) -> Option<String> {
        self.versions
            .iter()
            .find(|(_, v)| v.stages.contains(stage))
            .map(|(id, _)| id.clone())
    }

    /// Attach `stage` to `version_id`, detaching it elsewhere if exclusive.
    fn attach(&mut self, version_id: &str, stage: &VersionStage) {
        if stage.is_exclusive() {
            let previous_holder = self.holder_of(stage);
            for (id, version) in self.versions.iter_mut() {
                if id != version_id {
                    version.stages.remove(stage);
                }
            }
            if *stage == VersionStage::Current {
                if let Some(old) = previous_holder.filter(|old| old != version_id) {
                    self.attach(&old, &VersionStage::Previous);
                }
            }
        }

        if let Some(version) = self.versions.get_mut(version_id) {
            version.stages.insert(stage.clone());
            if *stage == VersionStage::Current {
                version.stages.remove(&VersionStage::Pending);
                version.stages.remove(&VersionStage::Previous);
            }
        }
    }
}

/// Secret store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<String, StoredSecret>>,
    mutations: AtomicUsize,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a secret whose first version is `AWSCURRENT`.
    ///
    /// Returns the generated version id.
    pub fn create_secret(&self, secret_id: &str, value: &str, rotation_enabled: bool) -> String {
        let version_id = uuid::Uuid::new_v4().to_string();
        let mut secret = StoredSecret {
            rotation_enabled,
            versions: BTreeMap::new(),
        };
        secret.versions.insert(
            version_id.clone(),
            StoredVersion {
                value: Some(value.to_string()),
                stages: BTreeSet::from([VersionStage::Current]),
            },
        );
        self.secrets.write().insert(secret_id.to_string(), secret);
        version_id
    }

    /// Reserve `version_id` under `AWSPENDING` without a value, the way the
    /// managed service does when it starts a rotation.
    pub fn begin_rotation(&self, secret_id: &str, version_id: &str) -> Result<(), StoreError> {
        let mut secrets = self.secrets.write();
        let secret = secrets
            .get_mut(secret_id)
            .ok_or_else(|| StoreError::NotFound(format!("secret '{secret_id}'")))?;
        secret.versions.entry(version_id.to_string()).or_default();
        secret.attach(version_id, &VersionStage::Pending);
        debug!("Reserved pending version {version_id} for {secret_id}");
        Ok(())
    }

    /// Remove `stage` from `version_id` without attaching it elsewhere.
    pub fn detach_stage(
        &self,
        secret_id: &str,
        version_id: &str,
        stage: &VersionStage,
    ) -> Result<(), StoreError> {
        let mut secrets = self.secrets.write();
        let version = secrets
            .get_mut(secret_id)
            .and_then(|s| s.versions.get_mut(version_id))
            .ok_or_else(|| StoreError::NotFound(format!("secret '{secret_id}' version {version_id}")))?;
        version.stages.remove(stage);
        Ok(())
    }

    pub fn set_rotation_enabled(&self, secret_id: &str, enabled: bool) -> Result<(), StoreError> {
        let mut secrets = self.secrets.write();
        let secret = secrets
            .get_mut(secret_id)
            .ok_or_else(|| StoreError::NotFound(format!("secret '{secret_id}'")))?;
        secret.rotation_enabled = enabled;
        Ok(())
    }

    /// Number of successful `put_secret_value`/`update_version_stage` calls.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn describe_secret(&self, secret_id: &str) -> Result<SecretMetadata, StoreError> {
        let secrets = self.secrets.read();
        let secret = secrets
            .get(secret_id)
            .ok_or_else(|| StoreError::NotFound(format!("secret '{secret_id}'")))?;
        Ok(SecretMetadata {
            arn: secret_id.to_string(),
            rotation_enabled: secret.rotation_enabled,
            versions: secret
                .versions
                .iter()
                .map(|(id, v)| (id.clone(), v.stages.clone()))
                .collect(),
        })
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        selector: &VersionSelector,
    ) -> Result<SecretValue, StoreError> {
        let secrets = self.secrets.read();
        let secret = secrets
            .get(secret_id)
            .ok_or_else(|| StoreError::NotFound(format!("secret '{secret_id}'")))?;

        let not_found = || StoreError::NotFound(format!("secret '{secret_id}' {selector}"));

        let version_id = match (&selector.version_id, &selector.stage) {
            (Some(id), _) => id.clone(),
            (None, Some(stage)) => secret.holder_of(stage).ok_or_else(not_found)?,
            (None, None) => secret
                .holder_of(&VersionStage::Current)
                .ok_or_else(not_found)?,
        };
        let version = secret.versions.get(&version_id).ok_or_else(not_found)?;
        if let Some(stage) = &selector.stage {
            if !version.stages.contains(stage) {
                return Err(not_found());
            }
        }
        let value = version.value.clone().ok_or_else(not_found)?;

        Ok(SecretValue {
            arn: secret_id.to_string(),
            version_id,
            secret_string: value,
            stages: version.stages.clone(),
        })
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
        value: &str,
        stages: &[VersionStage],
    ) -> Result<(), StoreError> {
        let mut secrets = self.secrets.write();
        let secret = secrets
            .get_mut(secret_id)
            .ok_or_else(|| StoreError::NotFound(format!("secret '{secret_id}'")))?;

        let version = secret.versions.entry(version_id.to_string()).or_default();
        let conflicting = version
            .value
            .as_deref()
            .is_some_and(|existing| existing != value);
        if conflicting {
            return Err(StoreError::InvalidRequest(format!(
                "version {version_id} of '{secret_id}' already holds a different value"
            )));
        }
        if version.value.is_none() {
            version.value = Some(value.to_string());
        }

        let stages = if stages.is_empty() {
            vec![VersionStage::Current]
        } else {
            stages.to_vec()
        };
        for stage in &stages {
            secret.attach(version_id, stage);
        }

        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_version_stage(
        &self,
        secret_id: &str,
        stage: &VersionStage,
        move_to: &str,
        remove_from: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut secrets = self.secrets.write();
        let secret = secrets
            .get_mut(secret_id)
            .ok_or_else(|| StoreError::NotFound(format!("secret '{secret_id}'")))?;

        if !secret.versions.contains_key(move_to) {
            return Err(StoreError::NotFound(format!(
                "secret '{secret_id}' version {move_to}"
            )));
        }

        if let Some(from) = remove_from {
            let carries_stage = secret
                .versions
                .get(from)
                .is_some_and(|v| v.stages.contains(stage));
            if !carries_stage {
                return Err(StoreError::InvalidRequest(format!(
                    "version {from} of '{secret_id}' does not carry {stage}"
                )));
            }
        }

        if stage.is_exclusive() {
            if let Some(holder) = secret.holder_of(stage) {
                if holder != move_to && remove_from != Some(holder.as_str()) {
                    return Err(StoreError::InvalidRequest(format!(
                        "{stage} is attached to version {holder}; it must be named as the version to remove from"
                    )));
                }
            }
        }

        if let Some(from) = remove_from {
            if let Some(version) = secret.versions.get_mut(from) {
                version.stages.remove(stage);
            }
        }
        secret.attach(move_to, stage);
        if *stage == VersionStage::Current {
            if let Some(from) = remove_from.filter(|from| *from != move_to) {
                secret.attach(from, &VersionStage::Previous);
            }
        }

        self.mutations.fetch_add(1, Ordering::SeqCst);
        debug!("Moved {stage} of {secret_id} to version {move_to}");
        Ok(())
    }
}
