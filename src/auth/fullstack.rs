//! HTTP client for the JWT auth server behind the bch-js REST API.

use super::{AuthClient, AuthError, AuthSession, LoginCredentials, UserData};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

pub struct FullstackAuthClient {
    client: Client,
    base_url: String,
}

impl FullstackAuthClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `POST /auth`. `Ok(None)` when the service rejects the login.
    async fn login(&self, login: &LoginCredentials) -> Result<Option<AuthSession>, AuthError> {
        let resp = self
            .client
            .post(format!("{}/auth", self.base_url))
            .json(&json!({ "email": login.username, "password": login.password }))
            .send()
            .await?;

        match resp.status() {
            status if status.is_success() => Ok(Some(resp.json::<SessionResponse>().await?.into())),
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(None),
            status => Err(service_error(status, resp).await),
        }
    }

    /// `POST /users`. `Ok(None)` when the account cannot be created, which
    /// for an existing email means the stored password is wrong.
    async fn create_user(&self, login: &LoginCredentials) -> Result<Option<AuthSession>, AuthError> {
        let resp = self
            .client
            .post(format!("{}/users", self.base_url))
            .json(&json!({ "user": { "email": login.username, "password": login.password } }))
            .send()
            .await?;

        match resp.status() {
            status if status.is_success() => Ok(Some(resp.json::<SessionResponse>().await?.into())),
            status if status.is_client_error() => {
                let text = resp.text().await.unwrap_or_default();
                warn!("Auth service refused to create '{}': {status} {text}", login.username);
                Ok(None)
            }
            status => Err(service_error(status, resp).await),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
    user: UserData,
}

impl From<SessionResponse> for AuthSession {
    fn from(resp: SessionResponse) -> Self {
        AuthSession {
            user_token: resp.token,
            user: resp.user,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewTokenRequest {
    api_level: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewTokenResponse {
    api_token: Option<String>,
}

async fn service_error(status: StatusCode, resp: reqwest::Response) -> AuthError {
    let message = resp.text().await.unwrap_or_default();
    AuthError::Service {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl AuthClient for FullstackAuthClient {
    fn name(&self) -> &str {
        "fullstack"
    }

    async fn register(&self, login: &LoginCredentials) -> Result<Option<AuthSession>, AuthError> {
        info!(
            "Authenticating '{}' against auth service at {}",
            login.username, self.base_url
        );
        if let Some(session) = self.login(login).await? {
            return Ok(Some(session));
        }
        debug!("Login for '{}' rejected, attempting registration", login.username);
        self.create_user(login).await
    }

    async fn get_api_token(
        &self,
        session: &AuthSession,
        api_level: u32,
    ) -> Result<String, AuthError> {
        let resp = self
            .client
            .post(format!("{}/apitoken/new", self.base_url))
            .bearer_auth(&session.user_token)
            .json(&NewTokenRequest { api_level })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(service_error(status, resp).await);
        }

        let body: NewTokenResponse = resp.json().await?;
        let token = body
            .api_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedResponse("apiToken".to_string()))?;
        info!("Minted new API token at level {api_level}");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn login() -> LoginCredentials {
        LoginCredentials {
            username: "ops@example.com".into(),
            password: "hunter22".into(),
        }
    }

    fn session_body(api_token: &str) -> serde_json::Value {
        json!({
            "token": "user-jwt",
            "user": {
                "_id": "u1",
                "email": "ops@example.com",
                "apiLevel": 40,
                "apiToken": api_token,
                "bchAddr": "bitcoincash:qq123"
            }
        })
    }

    #[tokio::test]
    async fn register_logs_in_existing_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth"))
            .and(body_partial_json(json!({ "email": "ops@example.com" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("live")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = FullstackAuthClient::new(Client::new(), format!("{}/", server.uri()));
        let session = client.register(&login()).await.unwrap().unwrap();
        assert_eq!(session.api_token(), Some("live"));
        assert_eq!(session.user.api_level, 40);
    }

    #[tokio::test]
    async fn register_creates_unknown_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("")))
            .expect(1)
            .mount(&server)
            .await;

        let client = FullstackAuthClient::new(Client::new(), server.uri());
        assert!(client.register(&login()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn register_reports_unregistered_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(422).set_body_string("email already in use"))
            .mount(&server)
            .await;

        let client = FullstackAuthClient::new(Client::new(), server.uri());
        assert!(client.register(&login()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_api_token_uses_user_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/apitoken/new"))
            .and(header("Authorization", "Bearer user-jwt"))
            .and(body_partial_json(json!({ "apiLevel": 40 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "apiToken": "minted" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = FullstackAuthClient::new(Client::new(), server.uri());
        let session = AuthSession {
            user_token: "user-jwt".into(),
            user: UserData::default(),
        };
        let token = client.get_api_token(&session, 40).await.unwrap();
        assert_eq!(token, "minted");
    }

    #[tokio::test]
    async fn server_error_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = FullstackAuthClient::new(Client::new(), server.uri());
        let err = client.register(&login()).await.unwrap_err();
        assert!(matches!(err, AuthError::Service { status: 503, .. }));
    }
}
