//! In-process auth service.
//!
//! Issues real HS256 JWTs for a fixed set of users so a full rotation can run
//! without network access (`jwt-rotator simulate` and the test suite). Like
//! the hosted service it remembers the latest token minted per user, so a
//! later mint invalidates what an earlier one returned.

use super::{AuthClient, AuthError, AuthSession, LoginCredentials, UserData};
use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Default lifetime of minted API tokens.
const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug)]
struct LocalUser {
    password: String,
    api_level: u32,
    account_address: String,
    api_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTokenClaims<'a> {
    id: &'a str,
    api_level: u32,
    jti: String,
    iat: i64,
    exp: i64,
}

pub struct LocalAuthService {
    signing_key: EncodingKey,
    token_ttl: chrono::Duration,
    users: Mutex<HashMap<String, LocalUser>>,
    logins: AtomicUsize,
    mints: AtomicUsize,
}

impl LocalAuthService {
    pub fn new(signing_key: &[u8]) -> Self {
        Self {
            signing_key: EncodingKey::from_secret(signing_key),
            token_ttl: chrono::Duration::days(DEFAULT_TOKEN_TTL_DAYS),
            users: Mutex::new(HashMap::new()),
            logins: AtomicUsize::new(0),
            mints: AtomicUsize::new(0),
        }
    }

    /// Register a user up front.
    pub fn with_user(self, login: &LoginCredentials, api_level: u32, account_address: &str) -> Self {
        self.users.lock().insert(
            login.username.clone(),
            LocalUser {
                password: login.password.clone(),
                api_level,
                account_address: account_address.to_string(),
                api_token: None,
            },
        );
        self
    }

    /// Lifetime of newly minted tokens; negative values mint expired tokens.
    pub fn with_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Number of successful logins.
    pub fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    /// Number of tokens minted.
    pub fn mint_count(&self) -> usize {
        self.mints.load(Ordering::SeqCst)
    }

    fn sign(&self, subject: &str, api_level: u32, ttl: chrono::Duration) -> Result<String, AuthError> {
        let now = chrono::Utc::now();
        let claims = ApiTokenClaims {
            id: subject,
            api_level,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.signing_key)?)
    }
}

#[async_trait]
impl AuthClient for LocalAuthService {
    fn name(&self) -> &str {
        "local"
    }

    async fn register(&self, login: &LoginCredentials) -> Result<Option<AuthSession>, AuthError> {
        let users = self.users.lock();
        let Some(user) = users
            .get(&login.username)
            .filter(|u| u.password == login.password)
        else {
            debug!("Local auth rejected '{}'", login.username);
            return Ok(None);
        };

        let user_token = self.sign(&login.username, 0, chrono::Duration::hours(1))?;
        self.logins.fetch_add(1, Ordering::SeqCst);

        Ok(Some(AuthSession {
            user_token,
            user: UserData {
                email: login.username.clone(),
                api_level: user.api_level,
                api_token: user.api_token.clone(),
                account_address: Some(user.account_address.clone()),
            },
        }))
    }

    async fn get_api_token(
        &self,
        session: &AuthSession,
        api_level: u32,
    ) -> Result<String, AuthError> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&session.user.email)
            .ok_or_else(|| AuthError::Service {
                status: 401,
                message: format!("unknown user '{}'", session.user.email),
            })?;

        let token = self.sign(&session.user.email, api_level, self.token_ttl)?;
        user.api_token = Some(token.clone());
        self.mints.fetch_add(1, Ordering::SeqCst);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::inspect_api_token;

    fn login() -> LoginCredentials {
        LoginCredentials {
            username: "ops@example.com".into(),
            password: "hunter22".into(),
        }
    }

    #[tokio::test]
    async fn unknown_or_wrong_password_is_unregistered() {
        let auth = LocalAuthService::new(b"key").with_user(&login(), 40, "bitcoincash:qq1");
        let stranger = LoginCredentials {
            username: "ops@example.com".into(),
            password: "wrong".into(),
        };
        assert!(auth.register(&stranger).await.unwrap().is_none());
        assert_eq!(auth.login_count(), 0);
    }

    #[tokio::test]
    async fn minting_replaces_live_token() {
        let auth = LocalAuthService::new(b"key").with_user(&login(), 40, "bitcoincash:qq1");
        let session = auth.register(&login()).await.unwrap().unwrap();
        assert!(session.api_token().is_none());

        let first = auth.get_api_token(&session, 40).await.unwrap();
        let second = auth.get_api_token(&session, 40).await.unwrap();
        assert_ne!(first, second);

        let fresh = auth.register(&login()).await.unwrap().unwrap();
        assert_eq!(fresh.api_token(), Some(second.as_str()));
        assert!(auth.validate_api_token(&fresh).is_valid);
        assert_eq!(auth.mint_count(), 2);
    }

    #[tokio::test]
    async fn negative_ttl_mints_expired_tokens() {
        let auth = LocalAuthService::new(b"key")
            .with_user(&login(), 40, "bitcoincash:qq1")
            .with_token_ttl(chrono::Duration::hours(-2));
        let session = auth.register(&login()).await.unwrap().unwrap();
        let token = auth.get_api_token(&session, 40).await.unwrap();
        assert!(!inspect_api_token(Some(&token)).is_valid);
    }
}
