//! Authentication service clients.
//!
//! The auth service issues the API tokens being rotated. A client logs in
//! with the username/password held in a sibling secret, mints new tokens at
//! the user's API level, and checks that a session's live token is usable.

pub mod fullstack;
pub mod local;

pub use fullstack::FullstackAuthClient;
pub use local::LocalAuthService;

use crate::logging::redact_secret;
use async_trait::async_trait;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Types
// ============================================================================

/// Login for the auth service, stored as JSON in its own secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn from_secret_string(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// User record returned by the auth service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub api_level: u32,
    /// The most recently minted API token for this user.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Account address linked to the user, used by the validation probe.
    #[serde(rename = "bchAddr", default)]
    pub account_address: Option<String>,
}

/// An authenticated handle on the auth service.
#[derive(Clone)]
pub struct AuthSession {
    /// Bearer token for user-scoped calls (distinct from the API token).
    pub user_token: String,
    pub user: UserData,
}

impl AuthSession {
    /// The live API token the service currently holds for this user.
    pub fn api_token(&self) -> Option<&str> {
        self.user.api_token.as_deref()
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_token", &redact_secret(&self.user_token))
            .field("email", &self.user.email)
            .field("api_level", &self.user.api_level)
            .field("api_token", &self.api_token().map(redact_secret))
            .field("account_address", &self.user.account_address)
            .finish()
    }
}

/// Outcome of a local token check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValidation {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl TokenValidation {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("auth service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("auth service response is missing {0}")]
    MalformedResponse(String),
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

// ============================================================================
// Client Trait
// ============================================================================

#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Display name for logging.
    fn name(&self) -> &str;

    /// Log in (registering the user if the service supports it).
    ///
    /// `Ok(None)` means the login is not registered with the service.
    async fn register(&self, login: &LoginCredentials) -> Result<Option<AuthSession>, AuthError>;

    /// Mint a new API token at `api_level`. The service replaces the user's
    /// live token with the new one.
    async fn get_api_token(&self, session: &AuthSession, api_level: u32)
        -> Result<String, AuthError>;

    /// Check the session's live API token without a network round trip.
    fn validate_api_token(&self, session: &AuthSession) -> TokenValidation {
        inspect_api_token(session.api_token())
    }
}

/// Structural and expiry check of a JWT API token.
///
/// The signing key belongs to the auth service, so the signature is not
/// verified here; the token must parse and carry an unexpired `exp` claim.
pub fn inspect_api_token(token: Option<&str>) -> TokenValidation {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return TokenValidation::invalid("session holds no API token");
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    match jsonwebtoken::decode::<HashMap<String, serde_json::Value>>(
        token,
        &DecodingKey::from_secret(&[]),
        &validation,
    ) {
        Ok(_) => TokenValidation::valid(),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => TokenValidation::invalid("API token has expired"),
            ErrorKind::MissingRequiredClaim(claim) => {
                TokenValidation::invalid(format!("API token has no '{claim}' claim"))
            }
            _ => TokenValidation::invalid(format!("API token is malformed: {e}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn token_expiring_in(seconds: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + seconds;
        encode(
            &Header::default(),
            &json!({ "id": "user-1", "apiLevel": 40, "exp": exp }),
            &EncodingKey::from_secret(b"someone-elses-key"),
        )
        .unwrap()
    }

    #[test]
    fn accepts_unexpired_token_signed_by_unknown_key() {
        let token = token_expiring_in(3600);
        assert_eq!(inspect_api_token(Some(&token)), TokenValidation::valid());
    }

    #[test]
    fn rejects_expired_token() {
        let token = token_expiring_in(-3600);
        let result = inspect_api_token(Some(&token));
        assert!(!result.is_valid);
        assert!(result.reason.unwrap().contains("expired"));
    }

    #[test]
    fn rejects_missing_and_garbage_tokens() {
        assert!(!inspect_api_token(None).is_valid);
        assert!(!inspect_api_token(Some("")).is_valid);
        assert!(!inspect_api_token(Some("not-a-jwt")).is_valid);
    }

    #[test]
    fn rejects_token_without_expiry() {
        let token = encode(
            &Header::default(),
            &json!({ "id": "user-1" }),
            &EncodingKey::from_secret(b"k"),
        )
        .unwrap();
        assert!(!inspect_api_token(Some(&token)).is_valid);
    }

    #[test]
    fn login_credentials_parse_and_redact() {
        let login =
            LoginCredentials::from_secret_string(r#"{"username":"ops@example.com","password":"hunter22"}"#)
                .unwrap();
        assert_eq!(login.username, "ops@example.com");
        assert!(!format!("{login:?}").contains("hunter22"));
    }

    #[test]
    fn user_data_reads_service_field_names() {
        let user: UserData = serde_json::from_value(json!({
            "_id": "5f1",
            "email": "ops@example.com",
            "apiLevel": 40,
            "apiToken": "tok",
            "bchAddr": "bitcoincash:qq123"
        }))
        .unwrap();
        assert_eq!(user.api_level, 40);
        assert_eq!(user.account_address.as_deref(), Some("bitcoincash:qq123"));
    }
}
