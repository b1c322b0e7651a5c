use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::{CatalogConnection, RestCatalogClient};
use crate::config::{AppConfig, ProviderKind};
use crate::credentials::CredentialResolver;
use crate::error::SyncResult;
use crate::load_config::load_config;
use crate::provider::{Provider, RunOptions};
use crate::providers::{EksClusterProvider, RdsInstanceProvider, S3BucketProvider};
use crate::runner::ProviderRegistry;
use crate::sdk::{SdkEksApiFactory, SdkRdsApiFactory, SdkS3ApiFactory, StsCredentialResolver};

/// CLI for aws-catalog-sync: ingest AWS resources into a software catalog.
#[derive(Parser)]
#[clap(
    name = "aws-catalog-sync",
    version,
    about = "Ingest AWS resources (EKS, RDS, S3) into a software catalog as full entity mutations"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the configured providers against the catalog using the given config file
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Run every provider once and exit instead of running on a schedule
        #[clap(long)]
        once: bool,
    },
    /// Load and validate a config file without touching the network
    Validate {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Builds the provider registry from configuration. Fails on the first
/// invalid provider entry.
pub fn build_registry(config: &AppConfig, options: RunOptions) -> SyncResult<ProviderRegistry> {
    let credentials: Arc<dyn CredentialResolver> = Arc::new(StsCredentialResolver::default());
    let mut registry = ProviderRegistry::new();
    for settings in &config.providers {
        let provider: Box<dyn Provider> = match settings.kind {
            ProviderKind::EksCluster => Box::new(EksClusterProvider::from_config(
                settings,
                credentials.clone(),
                Arc::new(SdkEksApiFactory),
                options.clone(),
            )?),
            ProviderKind::RdsInstance => Box::new(RdsInstanceProvider::from_config(
                settings,
                credentials.clone(),
                Arc::new(SdkRdsApiFactory),
                options.clone(),
            )?),
            ProviderKind::S3Bucket => Box::new(S3BucketProvider::from_config(
                settings,
                credentials.clone(),
                Arc::new(SdkS3ApiFactory),
                options.clone(),
            )?),
        };
        registry.register(provider);
    }
    Ok(registry)
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Validate { config } => {
            let config = load_config(config)?;
            // Construction performs the per-provider field validation.
            let registry = build_registry(&config, RunOptions::default())?;
            println!("Config OK: {} provider(s)", registry.len());
            for name in registry.provider_names() {
                println!("  {name}");
            }
            Ok(())
        }
        Commands::Sync { config, once } => {
            let config = load_config(config)?;
            let cancel = CancellationToken::new();
            let options = RunOptions {
                cancel: cancel.clone(),
                ..RunOptions::default()
            };
            let mut registry = build_registry(&config, options)?;

            let token = std::env::var("CATALOG_TOKEN").ok();
            let connection: CatalogConnection = Arc::new(RestCatalogClient::new(
                config.catalog.base_url.clone(),
                token,
            ));
            registry.attach_all(&connection);

            if once {
                println!("Sync starting...");
                let results = registry.run_once().await;
                let failed = results.iter().filter(|result| result.is_err()).count();
                for result in &results {
                    match result {
                        Ok(summary) => println!(
                            "  {}: {} entities in {} page(s) ({:?})",
                            summary.provider, summary.entities, summary.pages, summary.duration
                        ),
                        Err(e) => eprintln!("[ERROR] Provider run failed: {e}"),
                    }
                }
                if failed > 0 {
                    anyhow::bail!("{failed} provider run(s) failed");
                }
                println!("Sync complete.");
                Ok(())
            } else {
                let interval = Duration::from_secs(config.schedule.interval_seconds);
                let shutdown = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Shutdown signal received");
                        shutdown.cancel();
                    }
                });
                registry.run_scheduled(interval, cancel).await;
                println!("Sync stopped.");
                Ok(())
            }
        }
    }
}
