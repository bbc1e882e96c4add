use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the rotated secret lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Explicit endpoint, e.g. an emulator or a signing proxy.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
}

impl StoreConfig {
    /// The configured endpoint, or the regional service endpoint.
    pub fn resolved_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://secretsmanager.{}.amazonaws.com", self.region))
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_region(),
        }
    }
}

/// The auth service issuing the rotated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default = "default_auth_url")]
    pub base_url: String,
    /// Id of the sibling secret holding the auth-service login.
    #[serde(default)]
    pub credentials_secret_id: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: default_auth_url(),
            credentials_secret_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
