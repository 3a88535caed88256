//! Error taxonomy for a discovery run

use thiserror::Error;

/// Errors that can occur while discovering or publishing APIs
///
/// `status` is `None` when the upstream could not be reached at all.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Credential exchange failed
    #[error("Authentication failed ({}): {message}", status_label(.status))]
    Auth {
        status: Option<u16>,
        message: String,
    },

    /// A listing call against the control plane failed
    #[error("Query {resource} failed ({}): {message}", status_label(.status))]
    Query {
        resource: String,
        status: Option<u16>,
        message: String,
    },

    /// Delivery to the registry failed
    #[error("Publish failed ({}): {message}", status_label(.status))]
    Publish {
        status: Option<u16>,
        message: String,
    },

    /// An upstream answered 2xx with a body we could not read
    #[error("Unreadable response from {resource}: {message}")]
    Decode { resource: String, message: String },

    /// Invalid local configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reading or writing the known-ids file failed
    #[error("Known-ids store error at {path}: {message}")]
    Store { path: String, message: String },
}

impl DiscoveryError {
    /// Stage of the run that failed, for user-facing reports
    pub fn stage(&self) -> &'static str {
        match self {
            DiscoveryError::Auth { .. } => "auth",
            DiscoveryError::Query { .. } => "query",
            DiscoveryError::Publish { .. } => "publish",
            DiscoveryError::Decode { .. } => "decode",
            DiscoveryError::Config(_) => "config",
            DiscoveryError::Store { .. } => "store",
        }
    }

    /// Upstream HTTP status, if the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            DiscoveryError::Auth { status, .. }
            | DiscoveryError::Query { status, .. }
            | DiscoveryError::Publish { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn query(resource: impl Into<String>, err: reqwest::Error) -> Self {
        DiscoveryError::Query {
            resource: resource.into(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "unreachable".to_string(),
    }
}
