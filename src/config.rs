//! Endpoint and HTTP client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DiscoveryError;

const CONTROL_PLANE_URL: &str = "https://anypoint.mulesoft.com";
const REGISTRY_URL: &str = "https://autodiscovery.treblle.com/api/v1/mulesoft";
const USER_AGENT: &str = "MuleSoft-API-Discovery/1.0";

/// Configuration shared by the control plane and registry clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Control plane base URL (no trailing slash)
    pub control_plane_url: String,
    /// Registry endpoint receiving the discovery batch
    pub registry_url: String,
    /// User agent sent on every request
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            control_plane_url: CONTROL_PLANE_URL.to_string(),
            registry_url: REGISTRY_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Control plane URL without a trailing slash
    pub fn control_plane_base(&self) -> &str {
        self.control_plane_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), DiscoveryError> {
        for (name, url) in [
            ("control plane URL", &self.control_plane_url),
            ("registry URL", &self.registry_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(DiscoveryError::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        if self.timeout_secs == 0 {
            return Err(DiscoveryError::Config(
                "timeout must be at least one second".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the HTTP client used by both collaborators
    pub(crate) fn http_client(&self) -> Result<reqwest::Client, DiscoveryError> {
        self.validate()?;

        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout())
            .build()
            .map_err(|e| DiscoveryError::Config(format!("Failed to build HTTP client: {}", e)))
    }
}
