//! Discovery Types
//!
//! Core types for environments, APIs, policies and the records a run
//! reports to the registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Client credentials for the control plane token exchange
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Bearer token valid for one discovery run
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<redacted>)")
    }
}

/// A deployment stage within the organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    pub name: String,
}

impl Environment {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An API registered in exactly one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Api {
    pub id: String,
    /// Human-readable name of the API asset
    pub asset_id: String,
}

impl Api {
    pub fn new(id: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            asset_id: asset_id.into(),
        }
    }
}

/// A policy attached to an API
///
/// `asset_id` is the policy catalog identifier, not an [`Api`] id. It is
/// absent when the control plane omits the policy template.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub policy_id: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub policy_template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

/// An environment-wide policy applied to every API in the environment
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

/// An API confirmed to carry the governance policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRecord {
    pub api_name: String,
    pub api_id: String,
    pub environment_name: String,
    pub environment_id: String,
}

impl DiscoveryRecord {
    pub fn new(api: &Api, environment: &Environment) -> Self {
        Self {
            api_name: api.asset_id.clone(),
            api_id: api.id.clone(),
            environment_name: environment.name.clone(),
            environment_id: environment.id.clone(),
        }
    }
}

/// An API with its full policy list, produced by the inventory dry-run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInventoryEntry {
    pub api_name: String,
    pub api_id: String,
    pub environment_name: String,
    pub environment_id: String,
    pub policies: Vec<Policy>,
}

/// API ids already reported to the registry
///
/// Only ever grows: [`KnownIds::with_records`] returns a superset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownIds(BTreeSet<String>);

impl KnownIds {
    pub fn contains(&self, api_id: &str) -> bool {
        self.0.contains(api_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Fold the ids of published records into a new set
    pub fn with_records(&self, records: &[DiscoveryRecord]) -> Self {
        let mut ids = self.0.clone();
        ids.extend(records.iter().map(|r| r.api_id.clone()));
        Self(ids)
    }

    /// Union with another set
    pub fn merged(mut self, other: KnownIds) -> Self {
        self.0.extend(other.0);
        self
    }
}

impl<S: Into<String>> FromIterator<S> for KnownIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_record_serializes_camel_case() {
        let record = DiscoveryRecord::new(
            &Api::new("1001", "orders-api"),
            &Environment::new("env-1", "Production"),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["apiName"], "orders-api");
        assert_eq!(json["apiId"], "1001");
        assert_eq!(json["environmentName"], "Production");
        assert_eq!(json["environmentId"], "env-1");
    }

    #[test]
    fn test_known_ids_only_grow() {
        let known: KnownIds = ["1", "2"].into_iter().collect();
        let records = vec![
            DiscoveryRecord::new(&Api::new("2", "b"), &Environment::new("e", "E")),
            DiscoveryRecord::new(&Api::new("3", "c"), &Environment::new("e", "E")),
        ];

        let updated = known.with_records(&records);

        assert_eq!(updated.len(), 3);
        assert!(known.iter().all(|id| updated.contains(id)));
        assert!(updated.contains("3"));
        assert_eq!(known.len(), 2);
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let creds = Credentials::new("client", "s3cr3t");
        let token = AccessToken::new("bearer-value");

        assert!(!format!("{:?}", creds).contains("s3cr3t"));
        assert!(!format!("{:?}", token).contains("bearer-value"));
    }

    #[test]
    fn test_known_ids_json_is_a_plain_array() {
        let known: KnownIds = ["b", "a"].into_iter().collect();
        assert_eq!(serde_json::to_string(&known).unwrap(), r#"["a","b"]"#);
    }
}
