//! REST client for the conversation backend

use super::config::ProvisioningConfig;
use super::ConversationApi;
use crate::error::{ProvisioningError, Result};
use crate::types::{ConversationConfig, ConversationSession};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};

/// Header carrying the static API key
const API_KEY_HEADER: &str = "x-api-key";

/// Provisioning REST client
///
/// Thin wrapper over `reqwest`; each call is exactly one request.
pub struct ProvisioningClient {
    http: reqwest::Client,
    config: ProvisioningConfig,
}

impl ProvisioningClient {
    /// Build a client; fails if the config is invalid
    pub fn new(config: ProvisioningConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("a3s-conversation/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProvisioningError::InvalidConfig(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { http, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        check_status(response).await
    }
}

#[async_trait]
impl ConversationApi for ProvisioningClient {
    async fn create_session(&self, config: &ConversationConfig) -> Result<ConversationSession> {
        if config.replica_id.trim().is_empty() {
            return Err(ProvisioningError::InvalidConfig(
                "replica_id must not be empty".to_string(),
            ));
        }

        let url = self.config.conversations_url()?;
        let response = self.send(self.http.post(url).json(config)).await?;
        let session: ConversationSession = decode(response).await?;

        tracing::info!(
            session_id = %session.id,
            replica_id = %config.replica_id,
            "Conversation session created"
        );
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Result<ConversationSession> {
        let url = self.config.conversation_url(id)?;
        let response = self.send(self.http.get(url)).await?;
        let session: ConversationSession = decode(response).await?;

        tracing::debug!(
            session_id = %session.id,
            status = ?session.status,
            "Conversation session fetched"
        );
        Ok(session)
    }

    async fn end_session(&self, id: &str) -> Result<()> {
        let url = self.config.conversation_url(id)?;
        let response = self.send(self.http.delete(url)).await?;

        tracing::info!(
            session_id = %id,
            status = response.status().as_u16(),
            "Conversation session ended"
        );
        Ok(())
    }
}

/// Map non-2xx responses onto the error taxonomy
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();

    tracing::warn!(status = status.as_u16(), url = %url, "Provisioning request failed");

    if status == StatusCode::UNAUTHORIZED {
        return Err(ProvisioningError::InvalidCredential);
    }
    Err(ProvisioningError::Backend {
        status: status.as_u16(),
        message: backend_message(&body),
    })
}

async fn decode(response: Response) -> Result<ConversationSession> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ProvisioningError::Decode(e.to_string()))
}

/// Pull the human-readable message out of an error body
///
/// Backends answer `{"message": ...}` or `{"error": ...}`; anything else
/// is surfaced verbatim.
fn backend_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error", "detail"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_from_json() {
        assert_eq!(backend_message(r#"{"message":"replica not found"}"#), "replica not found");
        assert_eq!(backend_message(r#"{"error":"bad request"}"#), "bad request");
    }

    #[test]
    fn test_backend_message_raw_body() {
        assert_eq!(backend_message("  upstream timeout\n"), "upstream timeout");
        assert_eq!(backend_message(r#"{"code":7}"#), r#"{"code":7}"#);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = ProvisioningClient::new(ProvisioningConfig::new(""));
        assert!(matches!(result, Err(ProvisioningError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_replica_without_io() {
        // Unroutable base URL: any network attempt would surface as Transport
        let client = ProvisioningClient::new(
            ProvisioningConfig::new("key").with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        let err = client
            .create_session(&ConversationConfig::new("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::InvalidConfig(_)));
    }
}
