//! API Policy Discovery Library
//!
//! Walks an organization's environments on the API-management control plane,
//! finds the APIs that carry the governance policy (either through an
//! environment-wide automated policy or a per-API attachment), drops the ones
//! already reported in an earlier run and publishes the rest to the registry.
//!
//! ## Flow
//!
//! 1. Exchange client credentials for a bearer token ([`AnypointClient`])
//! 2. List environments, then APIs per environment ([`ControlPlane`])
//! 3. Decide policy coverage once per environment ([`Reconciler`])
//! 4. Publish the discovery delta in one batch ([`Registry`])
//!
//! ## Example Usage
//!
//! ```ignore
//! use api_policy_discovery::{Credentials, DiscoveryAgent, DiscoveryConfig, KnownIds};
//!
//! let agent = DiscoveryAgent::from_config(&DiscoveryConfig::default())?;
//! let credentials = Credentials::new("client-id", "client-secret");
//! let report = agent
//!     .run(&credentials, "org-id", KnownIds::default(), Some("api-key"))
//!     .await?;
//!
//! println!("published {} new APIs", report.records.len());
//! ```

pub mod agent;
pub mod classifier;
pub mod config;
pub mod control_plane;
pub mod error;
pub mod reconciler;
pub mod registry;
pub mod store;
pub mod types;

pub use agent::{DiscoveryAgent, RunReport};
pub use classifier::{is_target_policy, TARGET_POLICY_ASSET_ID};
pub use config::DiscoveryConfig;
pub use control_plane::{AnypointClient, ControlPlane, OrganizationSession};
pub use error::DiscoveryError;
pub use reconciler::{Discovery, EnvironmentMode, PolicyCoverage, Reconciler};
pub use registry::{Registry, RegistryPublisher};
pub use types::{
    AccessToken, Api, ApiInventoryEntry, AutomatedPolicy, Credentials, DiscoveryRecord,
    Environment, KnownIds, Policy,
};
