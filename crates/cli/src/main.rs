//! `certdeck` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`: start the record API over an in-memory store.
//! - `validate`: validate a workflow JSON file.
//! - `providers`: print the provider catalog.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use db::{MemoryStore, Seed};
use engine::{access_records, WorkflowModel};
use providers::{AccessUsage, ProviderRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "certdeck", about = "Certificate workflow records and validation", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "CERTDECK_BIND", default_value = "0.0.0.0:8090")]
        bind: String,
        /// JSON file with initial `accesses` and `workflows`.
        #[arg(long, env = "CERTDECK_SEED")]
        seed: Option<PathBuf>,
    },
    /// Validate a workflow record JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Seed file whose accesses the workflow may reference.
        #[arg(long, env = "CERTDECK_SEED")]
        seed: Option<PathBuf>,
    },
    /// Print the provider catalog.
    Providers {
        /// Only access providers usable for `apply`, `deploy` or `all`.
        #[arg(long)]
        usage: Option<AccessUsage>,
    },
}

fn load_seed(path: Option<&Path>) -> Result<Seed> {
    let Some(path) = path else {
        return Ok(Seed::default());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("cannot read seed {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid seed {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, seed } => {
            let seed = load_seed(seed.as_deref())?;
            info!(
                accesses = seed.accesses.len(),
                workflows = seed.workflows.len(),
                "loaded seed"
            );
            let store = MemoryStore::with_seed(seed).context("seed rejected by the store")?;
            let state = api::AppState::new(Arc::new(store));
            api::serve(&bind, state).await.with_context(|| format!("serving on {bind}"))?;
        }
        Command::Validate { path, seed } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let row = serde_json::from_str(&raw).context("invalid workflow JSON")?;
            let model = WorkflowModel::from_row(row)?;
            let accesses = access_records(load_seed(seed.as_deref())?.accesses);

            let report = model.validate(&accesses);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_valid() {
                bail!("workflow '{}' does not validate", model.name);
            }
            info!(workflow = %model.name, "workflow is valid");
        }
        Command::Providers { usage } => {
            let registry = ProviderRegistry::global();
            let catalog = match usage {
                Some(usage) => serde_json::json!({ "accesses": registry.list_by_usage(usage) }),
                None => serde_json::json!({
                    "accesses": registry.access_providers(),
                    "applyDns": registry.apply_dns_providers(),
                    "deploy": registry.deploy_providers(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
    }
    Ok(())
}
