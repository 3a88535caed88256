//! Discovery Agent
//!
//! One point-in-time run against one organization: acquire a token, list
//! environments, reconcile, publish the delta and hand back the updated
//! known-id set for the caller to persist.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::config::DiscoveryConfig;
use crate::control_plane::{AnypointClient, ControlPlane, OrganizationSession};
use crate::error::DiscoveryError;
use crate::reconciler::Reconciler;
use crate::registry::{Registry, RegistryPublisher};
use crate::types::{ApiInventoryEntry, Credentials, DiscoveryRecord, KnownIds};

/// Result of a discovery run
///
/// When publishing fails `known_ids` equals the input set and `records`
/// still holds the unpublished delta.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub records: Vec<DiscoveryRecord>,
    pub known_ids: KnownIds,
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Runs discovery against the control plane and publishes to the registry
pub struct DiscoveryAgent<R: Registry = RegistryPublisher> {
    client: AnypointClient,
    registry: R,
}

impl DiscoveryAgent<RegistryPublisher> {
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        Ok(Self::new(
            AnypointClient::new(config)?,
            RegistryPublisher::new(config)?,
        ))
    }
}

impl<R: Registry> DiscoveryAgent<R> {
    pub fn new(client: AnypointClient, registry: R) -> Self {
        Self { client, registry }
    }

    /// Acquire the run's token; it is not refreshed afterwards
    pub async fn open_session(
        &self,
        credentials: &Credentials,
        organization_id: &str,
    ) -> Result<OrganizationSession, DiscoveryError> {
        let token = self.client.exchange_credentials(credentials).await?;
        Ok(self.client.session(token, organization_id))
    }

    /// Full run: discover, dedup against `known_ids`, publish
    pub async fn run(
        &self,
        credentials: &Credentials,
        organization_id: &str,
        known_ids: KnownIds,
        api_key: Option<&str>,
    ) -> Result<RunReport, DiscoveryError> {
        info!(organization_id = %organization_id, known = known_ids.len(), "Starting discovery run");

        let session = self.open_session(credentials, organization_id).await?;
        self.run_with(&session, known_ids, api_key).await
    }

    /// Run against an already authenticated control plane
    pub async fn run_with<C: ControlPlane + ?Sized>(
        &self,
        control_plane: &C,
        known_ids: KnownIds,
        api_key: Option<&str>,
    ) -> Result<RunReport, DiscoveryError> {
        let environments = control_plane.list_environments().await?;
        info!(count = environments.len(), "Found environments");

        let discovery = Reconciler::new(control_plane)
            .reconcile(&environments, &known_ids)
            .await?;

        for record in &discovery.records {
            info!(
                api = %record.api_name,
                api_id = %record.api_id,
                environment = %record.environment_name,
                environment_id = %record.environment_id,
                "New API with governance policy"
            );
        }

        match self.registry.publish(&discovery.records, api_key).await {
            Ok(()) => Ok(RunReport {
                records: discovery.records,
                known_ids: discovery.known_ids,
                published: true,
                publish_error: None,
                completed_at: Utc::now(),
            }),
            Err(e) => {
                error!(error = %e, "Failed to publish API data, known ids left unchanged");
                Ok(RunReport {
                    records: discovery.records,
                    known_ids,
                    published: false,
                    publish_error: Some(e.to_string()),
                    completed_at: Utc::now(),
                })
            }
        }
    }

    /// Dry-run listing of every API with its policies
    pub async fn inventory(
        &self,
        credentials: &Credentials,
        organization_id: &str,
    ) -> Result<Vec<ApiInventoryEntry>, DiscoveryError> {
        let session = self.open_session(credentials, organization_id).await?;
        let environments = session.list_environments().await?;

        Reconciler::new(&session).inventory(&environments).await
    }
}
