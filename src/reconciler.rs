//! Discovery Reconciler
//!
//! Walks environments → APIs → policies, decides per environment whether
//! coverage comes from an automated policy or must be checked per API, and
//! assembles the records for APIs not already known.

use tracing::{debug, info};

use crate::classifier::{has_target_automated_policy, is_target_policy};
use crate::control_plane::ControlPlane;
use crate::error::DiscoveryError;
use crate::types::{Api, ApiInventoryEntry, DiscoveryRecord, Environment, KnownIds, Policy};

/// How policy presence is determined for the APIs of one environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentMode {
    /// The governance policy is applied environment-wide
    Automated,
    /// Each API's attached policies must be checked
    PerApi,
}

/// Policy coverage of a single API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyCoverage {
    AutomatedForEnvironment,
    PerApi(Vec<Policy>),
}

impl PolicyCoverage {
    /// Whether the governance policy applies; stops at the first match
    pub fn includes_target(&self) -> bool {
        match self {
            PolicyCoverage::AutomatedForEnvironment => true,
            PolicyCoverage::PerApi(policies) => policies.iter().any(is_target_policy),
        }
    }
}

/// Outcome of reconciling environments against the known ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Newly discovered APIs, in environment then API order
    pub records: Vec<DiscoveryRecord>,
    /// Known ids plus every newly discovered id
    pub known_ids: KnownIds,
}

/// Reconciles control plane state against previously reported APIs
pub struct Reconciler<'a, C: ControlPlane + ?Sized> {
    control_plane: &'a C,
}

impl<'a, C: ControlPlane + ?Sized> Reconciler<'a, C> {
    pub fn new(control_plane: &'a C) -> Self {
        Self { control_plane }
    }

    /// Decide once per environment how coverage is determined
    pub async fn environment_mode(
        &self,
        environment: &Environment,
    ) -> Result<EnvironmentMode, DiscoveryError> {
        let automated = self
            .control_plane
            .list_automated_policies(environment)
            .await?;

        if has_target_automated_policy(&automated) {
            info!(
                environment_id = %environment.id,
                "Found automated governance policy in environment"
            );
            Ok(EnvironmentMode::Automated)
        } else {
            info!(
                environment_id = %environment.id,
                "No automated governance policy in environment"
            );
            Ok(EnvironmentMode::PerApi)
        }
    }

    /// Coverage of one API under the environment's mode
    ///
    /// Automated environments never trigger a per-API policy query.
    pub async fn coverage(
        &self,
        mode: EnvironmentMode,
        environment: &Environment,
        api: &Api,
    ) -> Result<PolicyCoverage, DiscoveryError> {
        match mode {
            EnvironmentMode::Automated => Ok(PolicyCoverage::AutomatedForEnvironment),
            EnvironmentMode::PerApi => {
                let policies = self.control_plane.list_policies(environment, api).await?;
                for policy in &policies {
                    debug!(
                        api_id = %api.id,
                        policy_id = %policy.policy_id,
                        policy_type = %policy.policy_type,
                        "Found policy"
                    );
                }
                Ok(PolicyCoverage::PerApi(policies))
            }
        }
    }

    /// Records for the unknown, covered APIs of one environment
    ///
    /// In per-API mode policies are still fetched for known APIs; only the
    /// emitted records are filtered.
    pub async fn reconcile_environment(
        &self,
        environment: &Environment,
        known_ids: &KnownIds,
    ) -> Result<Vec<DiscoveryRecord>, DiscoveryError> {
        info!(
            environment = %environment.name,
            environment_id = %environment.id,
            "Processing environment"
        );

        let apis = self.control_plane.list_apis(environment).await?;
        debug!(count = apis.len(), environment = %environment.name, "Found APIs");

        let mode = self.environment_mode(environment).await?;

        let mut records = Vec::new();
        for api in &apis {
            let coverage = self.coverage(mode, environment, api).await?;
            if !coverage.includes_target() {
                continue;
            }

            if known_ids.contains(&api.id) {
                debug!(api_id = %api.id, "Governance policy present, already reported");
                continue;
            }

            info!(
                api = %api.asset_id,
                api_id = %api.id,
                environment = %environment.name,
                "Discovered API with governance policy"
            );
            records.push(DiscoveryRecord::new(api, environment));
        }

        Ok(records)
    }

    /// Reconcile all environments in input order; the first failure aborts
    pub async fn reconcile(
        &self,
        environments: &[Environment],
        known_ids: &KnownIds,
    ) -> Result<Discovery, DiscoveryError> {
        let mut records = Vec::new();
        for environment in environments {
            let found = self.reconcile_environment(environment, known_ids).await?;
            records.extend(found);
        }

        info!(
            discovered = records.len(),
            environments = environments.len(),
            "Reconciliation complete"
        );

        let known_ids = known_ids.with_records(&records);
        Ok(Discovery { records, known_ids })
    }

    /// Every API with its full policy list; no filtering, no dedup
    pub async fn inventory(
        &self,
        environments: &[Environment],
    ) -> Result<Vec<ApiInventoryEntry>, DiscoveryError> {
        let mut entries = Vec::new();
        for environment in environments {
            let apis = self.control_plane.list_apis(environment).await?;
            for api in apis {
                let policies = self.control_plane.list_policies(environment, &api).await?;
                entries.push(ApiInventoryEntry {
                    api_name: api.asset_id,
                    api_id: api.id,
                    environment_name: environment.name.clone(),
                    environment_id: environment.id.clone(),
                    policies,
                });
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::classifier::TARGET_POLICY_ASSET_ID;
    use crate::types::AutomatedPolicy;

    /// In-memory control plane that records policy queries
    #[derive(Default)]
    pub struct FakeControlPlane {
        pub environments: Vec<Environment>,
        pub apis: HashMap<String, Vec<Api>>,
        pub policies: HashMap<String, Vec<Policy>>,
        pub automated: HashMap<String, Vec<AutomatedPolicy>>,
        pub failing_environments: bool,
        pub failing_apis_for: Option<String>,
        pub failing_automated_for: Option<String>,
        pub failing_policies_for: Option<String>,
        pub policy_queries: Mutex<Vec<String>>,
    }

    fn query_error(resource: String, status: u16) -> DiscoveryError {
        DiscoveryError::Query {
            resource,
            status: Some(status),
            message: "upstream failure".to_string(),
        }
    }

    pub fn target_policy() -> Policy {
        Policy {
            policy_id: "p-target".to_string(),
            policy_type: "custom".to_string(),
            policy_template_id: "t-1".to_string(),
            asset_id: Some(TARGET_POLICY_ASSET_ID.to_string()),
        }
    }

    pub fn other_policy() -> Policy {
        Policy {
            policy_id: "p-other".to_string(),
            policy_type: "rate-limiting".to_string(),
            policy_template_id: "t-2".to_string(),
            asset_id: Some("rate-limiting".to_string()),
        }
    }

    impl FakeControlPlane {
        pub fn environment(mut self, env: Environment, apis: Vec<Api>, automated: bool) -> Self {
            if automated {
                self.automated.insert(
                    env.id.clone(),
                    vec![AutomatedPolicy {
                        asset_id: Some(TARGET_POLICY_ASSET_ID.to_string()),
                    }],
                );
            }
            self.apis.insert(env.id.clone(), apis);
            self.environments.push(env);
            self
        }

        pub fn policies(mut self, api_id: &str, policies: Vec<Policy>) -> Self {
            self.policies.insert(api_id.to_string(), policies);
            self
        }

        pub fn queried(&self) -> Vec<String> {
            self.policy_queries.lock().unwrap().clone()
        }

        /// Staging: automated, 3 APIs. Prod: per-API, one match out of two.
        pub fn two_environment_org() -> Self {
            FakeControlPlane::default()
                .environment(
                    Environment::new("env-stg", "staging"),
                    vec![
                        Api::new("s1", "search"),
                        Api::new("s2", "orders"),
                        Api::new("s3", "billing"),
                    ],
                    true,
                )
                .environment(
                    Environment::new("env-prd", "prod"),
                    vec![Api::new("p1", "orders"), Api::new("p2", "billing")],
                    false,
                )
                .policies("p1", vec![other_policy(), target_policy()])
                .policies("p2", vec![other_policy()])
        }
    }

    #[async_trait]
    impl ControlPlane for FakeControlPlane {
        async fn list_environments(&self) -> Result<Vec<Environment>, DiscoveryError> {
            if self.failing_environments {
                return Err(query_error("/environments".to_string(), 503));
            }
            Ok(self.environments.clone())
        }

        async fn list_apis(&self, environment: &Environment) -> Result<Vec<Api>, DiscoveryError> {
            if self.failing_apis_for.as_deref() == Some(environment.id.as_str()) {
                return Err(query_error(
                    format!("/environments/{}/apis", environment.id),
                    500,
                ));
            }
            Ok(self.apis.get(&environment.id).cloned().unwrap_or_default())
        }

        async fn list_policies(
            &self,
            _environment: &Environment,
            api: &Api,
        ) -> Result<Vec<Policy>, DiscoveryError> {
            self.policy_queries.lock().unwrap().push(api.id.clone());
            if self.failing_policies_for.as_deref() == Some(api.id.as_str()) {
                return Err(query_error(format!("/apis/{}/policies", api.id), 502));
            }
            Ok(self.policies.get(&api.id).cloned().unwrap_or_default())
        }

        async fn list_automated_policies(
            &self,
            environment: &Environment,
        ) -> Result<Vec<AutomatedPolicy>, DiscoveryError> {
            if self.failing_automated_for.as_deref() == Some(environment.id.as_str()) {
                return Err(query_error(
                    format!("/automated-policies?environmentId={}", environment.id),
                    401,
                ));
            }
            Ok(self
                .automated
                .get(&environment.id)
                .cloned()
                .unwrap_or_default())
        }
    }
}
