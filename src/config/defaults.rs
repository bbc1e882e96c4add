/// Default configuration constants used across the system.

/// Default auth server for the bch-js API tokens.
pub const DEFAULT_AUTH_URL: &str = "https://auth.fullstack.cash";

/// Default bch-js REST API, used by the validation probe.
pub const DEFAULT_API_URL: &str = "https://api.fullstack.cash/v5/";

/// Default region used to build the store endpoint when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default timeout for every outbound HTTP request.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default config file name searched in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "jwt-rotator.json";

/// Environment variables recognized as overrides.
pub const ENV_STORE_ENDPOINT: &str = "SECRETS_MANAGER_ENDPOINT";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_AUTH_URL: &str = "FULLSTACK_AUTH_URL";
pub const ENV_API_URL: &str = "FULLSTACK_API_URL";
pub const ENV_CREDENTIALS_SECRET: &str = "BCH_JS_CREDENTIALS_ARN";
pub const ENV_HTTP_TIMEOUT: &str = "JWT_ROTATOR_HTTP_TIMEOUT_SECS";
