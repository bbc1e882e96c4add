mod defaults;
mod types;
mod validation;

pub use defaults::*;
pub use types::*;
pub use validation::*;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level rotator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(find_config_file);

        let mut config = match config_path {
            Some(config_path) => {
                info!("Loading config from {}", config_path.display());
                load_config_file(&config_path)?
            }
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        };

        // Apply environment variable overrides
        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(ENV_STORE_ENDPOINT) {
            if !endpoint.is_empty() {
                self.store.endpoint = Some(endpoint);
            }
        }

        if let Ok(region) = std::env::var(ENV_REGION) {
            self.store.region = region;
        }

        if let Ok(url) = std::env::var(ENV_AUTH_URL) {
            self.auth.base_url = url;
        }

        if let Ok(arn) = std::env::var(ENV_CREDENTIALS_SECRET) {
            self.auth.credentials_secret_id = arn;
        }

        if let Ok(url) = std::env::var(ENV_API_URL) {
            self.probe.api_url = url;
        }

        if let Ok(timeout) = std::env::var(ENV_HTTP_TIMEOUT) {
            match timeout.parse() {
                Ok(secs) => self.http.timeout_secs = secs,
                Err(_) => warn!("Ignoring non-numeric {ENV_HTTP_TIMEOUT}='{timeout}'"),
            }
        }
    }
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from(DEFAULT_CONFIG_FILE),
        PathBuf::from("jwt-rotator.toml"),
    ];

    for path in &candidates {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // Check home directory
    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".jwt-rotator").join("config.json");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

/// Load configuration from a file path.
fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file '{}'", path.display()))?;

    let config: Config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in '{}'", path.display()))?,
        _ => json5::from_str(&content)
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))?,
    };

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_file(extension: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "jwt-rotator-{}.{extension}",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_json5_with_partial_sections() {
        let path = temp_file(
            "json",
            r#"{
                // emulator for local runs
                store: { endpoint: "http://localhost:4566" },
                auth: { credentialsSecretId: "login" },
            }"#,
        );
        let config = load_config_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.store.endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.store.region, DEFAULT_REGION);
        assert_eq!(config.auth.base_url, DEFAULT_AUTH_URL);
        assert_eq!(config.auth.credentials_secret_id, "login");
        assert_eq!(config.http.timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
    }

    #[test]
    fn loads_toml() {
        let path = temp_file(
            "toml",
            "[probe]\napiUrl = \"http://localhost:3000/v5/\"\n\n[http]\ntimeoutSecs = 5\n",
        );
        let config = load_config_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.probe.api_url, "http://localhost:3000/v5/");
        assert_eq!(config.http.timeout_secs, 5);
    }

    #[test]
    fn store_endpoint_defaults_to_region() {
        let config = Config::default();
        assert_eq!(
            config.store.resolved_endpoint(),
            "https://secretsmanager.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let missing = std::env::temp_dir().join("jwt-rotator-does-not-exist.json");
        assert!(load_config_file(&missing).is_err());
    }
}
