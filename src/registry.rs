//! Registry Publisher
//!
//! Delivers the discovery delta to the external registry in one batch.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::types::DiscoveryRecord;

/// Destination for discovery batches
#[async_trait]
pub trait Registry: Send + Sync {
    /// Deliver one non-empty batch. No retries.
    async fn deliver(
        &self,
        records: &[DiscoveryRecord],
        api_key: Option<&str>,
    ) -> Result<(), DiscoveryError>;

    /// Publish a batch; an empty batch succeeds without any delivery
    async fn publish(
        &self,
        records: &[DiscoveryRecord],
        api_key: Option<&str>,
    ) -> Result<(), DiscoveryError> {
        if records.is_empty() {
            info!("No API data to publish");
            return Ok(());
        }

        self.deliver(records, api_key).await
    }
}

/// HTTP publisher for the discovery registry
pub struct RegistryPublisher {
    http_client: Client,
    endpoint: String,
}

impl RegistryPublisher {
    pub fn new(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        Ok(Self {
            http_client: config.http_client()?,
            endpoint: config.registry_url.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Registry for RegistryPublisher {
    async fn deliver(
        &self,
        records: &[DiscoveryRecord],
        api_key: Option<&str>,
    ) -> Result<(), DiscoveryError> {
        let payload = serde_json::to_string_pretty(records).map_err(|e| DiscoveryError::Publish {
            status: None,
            message: format!("Failed to serialize payload: {}", e),
        })?;

        info!(
            endpoint = %self.endpoint,
            records = records.len(),
            "Publishing API data to registry"
        );
        debug!("Payload: {}", payload);

        let mut request = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(payload);

        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Error sending API data to registry");
            DiscoveryError::Publish {
                status: None,
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(
                status = status.as_u16(),
                "Registry rejected API data: {}",
                body
            );
            return Err(DiscoveryError::Publish {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        info!(status = status.as_u16(), "API data published to registry");
        debug!("Response body: {}", body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Api, Environment};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn publisher_for(server: &MockServer) -> RegistryPublisher {
        let config = DiscoveryConfig {
            registry_url: format!("{}/api/v1/mulesoft", server.uri()),
            ..Default::default()
        };
        RegistryPublisher::new(&config).unwrap()
    }

    fn records() -> Vec<DiscoveryRecord> {
        vec![DiscoveryRecord::new(
            &Api::new("18001", "orders"),
            &Environment::new("env-1", "Sandbox"),
        )]
    }

    #[tokio::test]
    async fn test_publish_posts_batch_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/mulesoft"))
            .and(header("x-api-key", "key-1"))
            .and(header("content-type", "application/json"))
            .and(header("user-agent", "MuleSoft-API-Discovery/1.0"))
            .and(body_json(json!([{
                "apiName": "orders",
                "apiId": "18001",
                "environmentName": "Sandbox",
                "environmentId": "env-1"
            }])))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        publisher_for(&server)
            .publish(&records(), Some("key-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_api_key_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = publisher_for(&server);
        publisher.publish(&records(), Some("")).await.unwrap();

        let received: Vec<Request> = server.received_requests().await.unwrap();
        assert!(received[0].headers.get("x-api-key").is_none());
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        publisher_for(&server).publish(&[], Some("key")).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_2xx_is_publish_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = publisher_for(&server)
            .publish(&records(), None)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "publish");
        assert_eq!(err.status(), Some(500));
    }
}
