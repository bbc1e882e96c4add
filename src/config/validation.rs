use super::Config;
use anyhow::Result;
use url::Url;

/// Validation errors for configuration.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn check_http_url(errors: &mut Vec<ConfigValidationError>, path: &str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ConfigValidationError {
            path: path.to_string(),
            message: format!("Unsupported URL scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ConfigValidationError {
            path: path.to_string(),
            message: format!("Invalid URL '{value}': {e}"),
        }),
    }
}

/// Validate a configuration object.
pub fn validate_config(config: &Config) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    if let Some(endpoint) = &config.store.endpoint {
        check_http_url(&mut errors, "store.endpoint", endpoint);
    } else if config.store.region.trim().is_empty() {
        errors.push(ConfigValidationError {
            path: "store.region".to_string(),
            message: "A region is required when no endpoint is set".to_string(),
        });
    }

    check_http_url(&mut errors, "auth.baseUrl", &config.auth.base_url);
    check_http_url(&mut errors, "probe.apiUrl", &config.probe.api_url);

    if config.auth.credentials_secret_id.trim().is_empty() {
        errors.push(ConfigValidationError {
            path: "auth.credentialsSecretId".to_string(),
            message: "The secret holding the auth-service login is required".to_string(),
        });
    }

    if config.http.timeout_secs == 0 {
        errors.push(ConfigValidationError {
            path: "http.timeoutSecs".to_string(),
            message: "Timeout must be greater than 0".to_string(),
        });
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &Config) -> Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("Configuration validation failed:\n{}", messages.join("\n"));
    }
}
