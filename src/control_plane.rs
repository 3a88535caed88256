//! Control Plane API Client
//!
//! Token exchange plus the read-only listings the reconciler walks:
//! environments, APIs per environment, policies per API and the
//! environment-wide automated policies.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, error, info};
use urlencoding::encode;

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::types::{AccessToken, Api, AutomatedPolicy, Credentials, Environment, Policy};

const TOKEN_PATH: &str = "/accounts/api/v2/oauth2/token";

/// Read-only view of one organization on the control plane
///
/// Every call fails with [`DiscoveryError::Query`] (or `Decode`) and the
/// caller is expected to abort the run.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Environments of the organization
    async fn list_environments(&self) -> Result<Vec<Environment>, DiscoveryError>;

    /// Snapshot of the APIs registered in an environment, in a stable order
    async fn list_apis(&self, environment: &Environment) -> Result<Vec<Api>, DiscoveryError>;

    /// Policies attached to one API
    async fn list_policies(
        &self,
        environment: &Environment,
        api: &Api,
    ) -> Result<Vec<Policy>, DiscoveryError>;

    /// Policies applied to every API of an environment
    async fn list_automated_policies(
        &self,
        environment: &Environment,
    ) -> Result<Vec<AutomatedPolicy>, DiscoveryError>;
}

// ============================================================
// API Response Types
// ============================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct EnvironmentList {
    data: Option<Vec<EnvironmentEntry>>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentEntry {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiList {
    assets: Option<Vec<AssetEntry>>,
}

#[derive(Debug, Deserialize)]
struct AssetEntry {
    apis: Option<Vec<ApiEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEntry {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    asset_id: String,
}

#[derive(Debug, Deserialize)]
struct PolicyList {
    policies: Option<Vec<PolicyEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyEntry {
    #[serde(default)]
    policy_id: Option<Value>,
    #[serde(default, rename = "type")]
    policy_type: Option<Value>,
    #[serde(default)]
    policy_template_id: Option<Value>,
    #[serde(default)]
    template: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutomatedPolicyList {
    automated_policies: Option<Vec<AutomatedPolicyEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutomatedPolicyEntry {
    #[serde(default)]
    asset_id: Option<Value>,
}

impl From<PolicyEntry> for Policy {
    fn from(entry: PolicyEntry) -> Self {
        let asset_id = entry
            .template
            .as_ref()
            .and_then(|t| t.get("assetId"))
            .and_then(scalar_text);

        Self {
            policy_id: entry.policy_id.as_ref().and_then(scalar_text).unwrap_or_default(),
            policy_type: entry.policy_type.as_ref().and_then(scalar_text).unwrap_or_default(),
            policy_template_id: entry
                .policy_template_id
                .as_ref()
                .and_then(scalar_text)
                .unwrap_or_default(),
            asset_id,
        }
    }
}

impl From<AutomatedPolicyEntry> for AutomatedPolicy {
    fn from(entry: AutomatedPolicyEntry) -> Self {
        Self {
            asset_id: entry.asset_id.as_ref().and_then(scalar_text),
        }
    }
}

/// Text of a string or number; any other shape reads as absent
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Ids come back as numbers from some endpoints and strings from others
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

// ============================================================
// Client Implementation
// ============================================================

/// Control plane HTTP client, not yet bound to a token
#[derive(Clone)]
pub struct AnypointClient {
    http_client: Client,
    base_url: String,
}

impl AnypointClient {
    pub fn new(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        Ok(Self {
            http_client: config.http_client()?,
            base_url: config.control_plane_base().to_string(),
        })
    }

    /// Exchange client credentials for a bearer token
    pub async fn exchange_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<AccessToken, DiscoveryError> {
        let url = format!("{}{}", self.base_url, TOKEN_PATH);

        debug!(client_id = %credentials.client_id, "Requesting access token");

        let response = self
            .http_client
            .post(&url)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| DiscoveryError::Auth {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Failed to get access token: {}", body);
            return Err(DiscoveryError::Auth {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let token: TokenResponse = decode_body(TOKEN_PATH, response).await?;

        info!("Access token obtained");
        Ok(AccessToken::new(token.access_token))
    }

    /// Bind the client to a token and organization
    pub fn session(&self, token: AccessToken, organization_id: &str) -> OrganizationSession {
        OrganizationSession {
            client: self.clone(),
            token,
            organization_id: organization_id.to_string(),
        }
    }
}

/// Authenticated access to one organization for the duration of a run
pub struct OrganizationSession {
    client: AnypointClient,
    token: AccessToken,
    organization_id: String,
}

impl OrganizationSession {
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    fn org_path(&self) -> String {
        format!(
            "/apimanager/api/v1/organizations/{}",
            encode(&self.organization_id)
        )
    }

    /// GET a resource path and decode its JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, DiscoveryError> {
        let url = format!("{}{}", self.client.base_url, resource);

        debug!(resource = %resource, "Querying control plane");

        let response = self
            .client
            .http_client
            .get(&url)
            .query(query)
            .bearer_auth(self.token.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| DiscoveryError::query(resource, e))?;

        let response = check_status(resource, response).await?;

        decode_body(resource, response).await
    }
}

/// Decode a JSON body, keeping serde's account of what did not fit
async fn decode_body<T: DeserializeOwned>(
    resource: &str,
    response: Response,
) -> Result<T, DiscoveryError> {
    let body = response.text().await.map_err(|e| DiscoveryError::Decode {
        resource: resource.to_string(),
        message: e.to_string(),
    })?;

    serde_json::from_str(&body).map_err(|e| DiscoveryError::Decode {
        resource: resource.to_string(),
        message: e.to_string(),
    })
}

async fn check_status(resource: &str, response: Response) -> Result<Response, DiscoveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!(
        resource = %resource,
        status = status.as_u16(),
        "Control plane query failed: {}",
        body
    );

    Err(DiscoveryError::Query {
        resource: resource.to_string(),
        status: Some(status.as_u16()),
        message: body,
    })
}

#[async_trait]
impl ControlPlane for OrganizationSession {
    async fn list_environments(&self) -> Result<Vec<Environment>, DiscoveryError> {
        let resource = format!(
            "/accounts/api/organizations/{}/environments",
            encode(&self.organization_id)
        );

        let list: EnvironmentList = self.get_json(&resource, &[]).await?;

        Ok(list
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|e| Environment::new(e.id, e.name))
            .collect())
    }

    async fn list_apis(&self, environment: &Environment) -> Result<Vec<Api>, DiscoveryError> {
        let resource = format!(
            "{}/environments/{}/apis",
            self.org_path(),
            encode(&environment.id)
        );

        let list: ApiList = self.get_json(&resource, &[]).await?;

        Ok(list
            .assets
            .unwrap_or_default()
            .into_iter()
            .flat_map(|asset| asset.apis.unwrap_or_default())
            .map(|a| Api::new(a.id, a.asset_id))
            .collect())
    }

    async fn list_policies(
        &self,
        environment: &Environment,
        api: &Api,
    ) -> Result<Vec<Policy>, DiscoveryError> {
        let resource = format!(
            "{}/environments/{}/apis/{}/policies",
            self.org_path(),
            encode(&environment.id),
            encode(&api.id)
        );

        let list: PolicyList = self.get_json(&resource, &[]).await?;

        Ok(list
            .policies
            .unwrap_or_default()
            .into_iter()
            .map(Policy::from)
            .collect())
    }

    async fn list_automated_policies(
        &self,
        environment: &Environment,
    ) -> Result<Vec<AutomatedPolicy>, DiscoveryError> {
        let resource = format!("{}/automated-policies", self.org_path());

        let list: AutomatedPolicyList = self
            .get_json(&resource, &[("environmentId", environment.id.as_str())])
            .await?;

        Ok(list
            .automated_policies
            .unwrap_or_default()
            .into_iter()
            .map(AutomatedPolicy::from)
            .collect())
    }
}
