//! API Policy Discovery Agent
//!
//! Finds the APIs carrying the governance policy on the control plane and
//! reports the newly found ones to the discovery registry.
//!
//! # Usage
//! ```bash
//! # Discover, publish and remember what was published
//! policy-discovery --org-id $ANYPOINT_ORG_ID discover --known-ids-file known.json
//!
//! # Dry run: every API with its full policy list
//! policy-discovery --org-id $ANYPOINT_ORG_ID inventory
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use api_policy_discovery::store::{load_known_ids, save_known_ids};
use api_policy_discovery::{Credentials, DiscoveryAgent, DiscoveryConfig, KnownIds};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "policy-discovery")]
#[command(about = "Governance policy discovery for API-management control planes", long_about = None)]
#[command(version)]
struct Cli {
    /// Control plane client ID
    #[arg(long, env = "ANYPOINT_CLIENT_ID")]
    client_id: String,

    /// Control plane client secret
    #[arg(long, env = "ANYPOINT_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Organization to scan
    #[arg(long, env = "ANYPOINT_ORG_ID")]
    org_id: String,

    /// Control plane base URL
    #[arg(long, env = "ANYPOINT_BASE_URL", default_value = "https://anypoint.mulesoft.com")]
    base_url: String,

    /// HTTP timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "30")]
    timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover new APIs with the governance policy and publish them
    Discover {
        /// Registry API key
        #[arg(long, env = "DISCOVERY_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Registry endpoint
        #[arg(
            long,
            env = "DISCOVERY_REGISTRY_URL",
            default_value = "https://autodiscovery.treblle.com/api/v1/mulesoft"
        )]
        registry_url: String,

        /// Already reported API id (repeatable)
        #[arg(long = "known-id")]
        known_ids: Vec<String>,

        /// JSON file of reported API ids, rewritten after a successful publish
        #[arg(long, env = "DISCOVERY_KNOWN_IDS_FILE")]
        known_ids_file: Option<PathBuf>,
    },

    /// List every API with its full policy list, without filtering or publishing
    Inventory,
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs)?;

    info!("🚀 Policy discovery starting (org: {})", cli.org_id);

    let credentials = Credentials::new(cli.client_id, cli.client_secret);

    match cli.command {
        Commands::Discover {
            api_key,
            registry_url,
            known_ids,
            known_ids_file,
        } => {
            let config = DiscoveryConfig {
                control_plane_url: cli.base_url,
                registry_url,
                timeout_secs: cli.timeout,
                ..Default::default()
            };
            let agent = DiscoveryAgent::from_config(&config)?;

            let mut known: KnownIds = known_ids.into_iter().collect();
            if let Some(path) = &known_ids_file {
                let stored = load_known_ids(path)
                    .await
                    .context("Failed to load known API ids")?;
                known = known.merged(stored);
            }

            let report = agent
                .run(&credentials, &cli.org_id, known, api_key.as_deref())
                .await
                .map_err(|e| {
                    error!(stage = e.stage(), "❌ Discovery run failed: {}", e);
                    e
                })?;

            println!("{}", serde_json::to_string_pretty(&report)?);

            if let Some(reason) = &report.publish_error {
                anyhow::bail!(
                    "Publish failed, {} discovered APIs not recorded: {}",
                    report.records.len(),
                    reason
                );
            }

            if let Some(path) = &known_ids_file {
                save_known_ids(path, &report.known_ids)
                    .await
                    .context("Failed to save known API ids")?;
            }

            info!(
                "✅ Published {} new APIs ({} known)",
                report.records.len(),
                report.known_ids.len()
            );
        }

        Commands::Inventory => {
            let config = DiscoveryConfig {
                control_plane_url: cli.base_url,
                timeout_secs: cli.timeout,
                ..Default::default()
            };
            let agent = DiscoveryAgent::from_config(&config)?;

            let entries = agent.inventory(&credentials, &cli.org_id).await?;

            println!("{}", serde_json::to_string_pretty(&entries)?);
            info!("✅ Listed {} APIs", entries.len());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    Ok(())
}
