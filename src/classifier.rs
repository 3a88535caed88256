//! Governance policy classification

use crate::types::{AutomatedPolicy, Policy};

/// Catalog identifier of the governance policy under discovery
pub const TARGET_POLICY_ASSET_ID: &str = "treblle-policy";

/// Whether a policy attached to an API is the governance policy
///
/// Policies without a catalog identifier never match.
pub fn is_target_policy(policy: &Policy) -> bool {
    matches_target(policy.asset_id.as_deref())
}

/// Whether an environment-wide policy list applies the governance policy
pub fn has_target_automated_policy(policies: &[AutomatedPolicy]) -> bool {
    policies
        .iter()
        .any(|p| matches_target(p.asset_id.as_deref()))
}

fn matches_target(asset_id: Option<&str>) -> bool {
    asset_id == Some(TARGET_POLICY_ASSET_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(asset_id: Option<&str>) -> Policy {
        Policy {
            policy_id: "p-1".to_string(),
            policy_type: "custom".to_string(),
            policy_template_id: "t-1".to_string(),
            asset_id: asset_id.map(str::to_string),
        }
    }

    #[test]
    fn test_target_policy_matches_on_asset_id() {
        assert!(is_target_policy(&policy(Some("treblle-policy"))));
        assert!(!is_target_policy(&policy(Some("rate-limiting"))));
        assert!(!is_target_policy(&policy(Some("Treblle-Policy"))));
    }

    #[test]
    fn test_missing_asset_id_never_matches() {
        assert!(!is_target_policy(&policy(None)));
        assert!(!is_target_policy(&Policy::default()));
    }

    #[test]
    fn test_automated_policy_list() {
        let none: Vec<AutomatedPolicy> = vec![];
        assert!(!has_target_automated_policy(&none));

        let list = vec![
            AutomatedPolicy { asset_id: None },
            AutomatedPolicy {
                asset_id: Some("client-id-enforcement".to_string()),
            },
            AutomatedPolicy {
                asset_id: Some(TARGET_POLICY_ASSET_ID.to_string()),
            },
        ];
        assert!(has_target_automated_policy(&list));
        assert!(!has_target_automated_policy(&list[..2]));
    }
}
