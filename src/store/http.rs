//! Secrets Manager JSON 1.1 client.
//!
//! Talks the managed service's wire protocol (`X-Amz-Target` operation
//! header, PascalCase JSON bodies) to a configured endpoint. Requests are not
//! SigV4-signed; point the endpoint at an emulator or a signing proxy.

use super::{
    SecretMetadata, SecretStore, SecretValue, StoreError, VersionSelector, VersionStage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "secretsmanager";

pub struct HttpSecretStore {
    client: Client,
    endpoint: String,
}

impl HttpSecretStore {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn call<Req, Resp>(&self, operation: &str, body: &Req) -> Result<Resp, StoreError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        debug!("Secrets Manager {operation} via {}", self.endpoint);

        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .header("Content-Type", CONTENT_TYPE)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(service_error(status.as_u16(), &text));
        }

        // Error-free responses may come back with an empty body.
        let bytes = resp.bytes().await?;
        let payload = if bytes.is_empty() { &b"{}"[..] } else { &bytes[..] };
        serde_json::from_slice(payload).map_err(|e| StoreError::Service {
            code: "MalformedResponse".to_string(),
            message: format!("{operation}: {e}"),
        })
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecretRequest<'a> {
    secret_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSecretResponse {
    #[serde(rename = "ARN", default)]
    arn: Option<String>,
    #[serde(default)]
    rotation_enabled: Option<bool>,
    #[serde(default)]
    version_ids_to_stages: Option<HashMap<String, Vec<String>>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueRequest<'a> {
    secret_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_stage: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    #[serde(rename = "ARN", default)]
    arn: Option<String>,
    version_id: String,
    #[serde(default)]
    secret_string: Option<String>,
    #[serde(default)]
    version_stages: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutSecretValueRequest<'a> {
    secret_id: &'a str,
    client_request_token: &'a str,
    secret_string: &'a str,
    version_stages: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateSecretVersionStageRequest<'a> {
    secret_id: &'a str,
    version_stage: &'a str,
    move_to_version_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remove_from_version_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// Map a non-2xx response onto [`StoreError`].
fn service_error(status: u16, body: &str) -> StoreError {
    let parsed: Option<ServiceErrorBody> = serde_json::from_str(body).ok();
    let (code, message) = match parsed {
        Some(ServiceErrorBody {
            error_type: Some(error_type),
            message,
        }) => {
            // `__type` may be namespaced, e.g. `com.amazonaws...#ResourceNotFoundException`.
            let code = error_type.rsplit('#').next().unwrap_or_default().to_string();
            (code, message.unwrap_or_default())
        }
        _ => (format!("HTTP {status}"), body.to_string()),
    };

    match code.as_str() {
        "ResourceNotFoundException" => StoreError::NotFound(message),
        "InvalidRequestException" | "InvalidParameterException" | "ResourceExistsException" => {
            StoreError::InvalidRequest(format!("{code}: {message}"))
        }
        _ => {
            warn!("Secrets Manager error {code}: {message}");
            StoreError::Service { code, message }
        }
    }
}

// ============================================================================
// SecretStore Implementation
// ============================================================================

#[async_trait]
impl SecretStore for HttpSecretStore {
    fn name(&self) -> &str {
        "secretsmanager"
    }

    async fn describe_secret(&self, secret_id: &str) -> Result<SecretMetadata, StoreError> {
        let resp: DescribeSecretResponse = self
            .call("DescribeSecret", &DescribeSecretRequest { secret_id })
            .await?;

        let versions = resp
            .version_ids_to_stages
            .unwrap_or_default()
            .into_iter()
            .map(|(id, stages)| (id, stages.into_iter().map(VersionStage::from).collect()))
            .collect();

        Ok(SecretMetadata {
            arn: resp.arn.unwrap_or_else(|| secret_id.to_string()),
            rotation_enabled: resp.rotation_enabled.unwrap_or(false),
            versions,
        })
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        selector: &VersionSelector,
    ) -> Result<SecretValue, StoreError> {
        let request = GetSecretValueRequest {
            secret_id,
            version_id: selector.version_id.as_deref(),
            version_stage: selector.stage.as_ref().map(VersionStage::as_str),
        };
        let resp: GetSecretValueResponse = self.call("GetSecretValue", &request).await?;

        let secret_string = resp.secret_string.ok_or_else(|| {
            StoreError::InvalidRequest(format!("secret '{secret_id}' {selector} has no string value"))
        })?;

        Ok(SecretValue {
            arn: resp.arn.unwrap_or_else(|| secret_id.to_string()),
            version_id: resp.version_id,
            secret_string,
            stages: resp.version_stages.into_iter().map(VersionStage::from).collect(),
        })
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: &str,
        value: &str,
        stages: &[VersionStage],
    ) -> Result<(), StoreError> {
        let request = PutSecretValueRequest {
            secret_id,
            client_request_token: version_id,
            secret_string: value,
            version_stages: stages.iter().map(VersionStage::as_str).collect(),
        };
        let _: IgnoredAny = self.call("PutSecretValue", &request).await?;
        Ok(())
    }

    async fn update_version_stage(
        &self,
        secret_id: &str,
        stage: &VersionStage,
        move_to: &str,
        remove_from: Option<&str>,
    ) -> Result<(), StoreError> {
        let request = UpdateSecretVersionStageRequest {
            secret_id,
            version_stage: stage.as_str(),
            move_to_version_id: move_to,
            remove_from_version_id: remove_from,
        };
        let _: IgnoredAny = self.call("UpdateSecretVersionStage", &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> HttpSecretStore {
        HttpSecretStore::new(Client::new(), server.uri())
    }

    #[tokio::test]
    async fn describe_parses_version_stages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-Amz-Target", "secretsmanager.DescribeSecret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ARN": "arn:aws:secretsmanager:us-east-1:1:secret:jwt",
                "RotationEnabled": true,
                "VersionIdsToStages": {
                    "v1": ["AWSCURRENT"],
                    "v2": ["AWSPENDING"]
                }
            })))
            .mount(&server)
            .await;

        let metadata = store_for(&server).describe_secret("jwt").await.unwrap();
        assert!(metadata.rotation_enabled);
        assert_eq!(metadata.version_with_stage(&VersionStage::Current), Some("v1"));
        assert_eq!(metadata.version_with_stage(&VersionStage::Pending), Some("v2"));
    }

    #[tokio::test]
    async fn missing_resource_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "__type": "com.amazonaws.secretsmanager#ResourceNotFoundException",
                "Message": "Secrets Manager can't find the specified secret value"
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let selector = VersionSelector::version_and_stage("v2", VersionStage::Pending);
        let found = store.find_secret_value("jwt", &selector).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn put_sends_request_token_and_stages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-Amz-Target", "secretsmanager.PutSecretValue"))
            .and(body_partial_json(json!({
                "SecretId": "jwt",
                "ClientRequestToken": "v2",
                "SecretString": "token",
                "VersionStages": ["AWSPENDING"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "VersionId": "v2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .put_secret_value("jwt", "v2", "token", &[VersionStage::Pending])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stage_move_names_both_versions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-Amz-Target", "secretsmanager.UpdateSecretVersionStage"))
            .and(body_partial_json(json!({
                "VersionStage": "AWSCURRENT",
                "MoveToVersionId": "v2",
                "RemoveFromVersionId": "v1"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .update_version_stage("jwt", &VersionStage::Current, "v2", Some("v1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn throttling_surfaces_as_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "__type": "ThrottlingException",
                "message": "Rate exceeded"
            })))
            .mount(&server)
            .await;

        let err = store_for(&server).describe_secret("jwt").await.unwrap_err();
        match err {
            StoreError::Service { code, .. } => assert_eq!(code, "ThrottlingException"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn binary_only_version_is_not_reported_missing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-Amz-Target", "secretsmanager.GetSecretValue"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ARN": "arn:aws:secretsmanager:us-east-1:1:secret:jwt",
                "VersionId": "v2",
                "SecretBinary": "AAEC",
                "VersionStages": ["AWSPENDING"]
            })))
            .mount(&server)
            .await;

        let selector = VersionSelector::version_and_stage("v2", VersionStage::Pending);
        let err = store_for(&server)
            .find_secret_value("jwt", &selector)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
    }
}
