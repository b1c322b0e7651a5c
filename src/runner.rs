//! Provider registry and the scheduled runner.
//!
//! Providers are independent: they share nothing at run time, so a tick
//! runs them all in parallel and one provider failing never aborts its
//! siblings. Failures are logged per provider and carried in the returned
//! outcomes for the caller to act on.

use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::catalog::CatalogConnection;
use crate::error::SyncResult;
use crate::provider::{Provider, RunSummary};

/// Owns the configured providers and drives their runs.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Names of all registered providers, in registration order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }

    /// Attach one shared catalog connection to every registered provider.
    pub fn attach_all(&mut self, connection: &CatalogConnection) {
        for provider in &mut self.providers {
            provider.attach(connection.clone());
        }
    }

    /// Run every provider once, in parallel, and collect per-provider
    /// outcomes in registration order.
    pub async fn run_once(&self) -> Vec<SyncResult<RunSummary>> {
        let runs = self.providers.iter().map(|provider| async move {
            let name = provider.provider_name();
            match provider.run(None).await {
                Ok(summary) => {
                    info!(
                        provider = %name,
                        entities = summary.entities,
                        pages = summary.pages,
                        duration_ms = summary.duration.as_millis() as u64,
                        "Provider run succeeded"
                    );
                    Ok(summary)
                }
                Err(e) => {
                    error!(provider = %name, error = %e, "Provider run failed");
                    Err(e)
                }
            }
        });
        join_all(runs).await
    }

    /// Run every provider on a fixed interval until the token is cancelled.
    ///
    /// The first tick fires immediately. Cancellation between ticks stops
    /// the loop; cancellation during a tick is observed by the providers at
    /// their next page boundary.
    pub async fn run_scheduled(&self, interval: Duration, cancel: CancellationToken) {
        info!(
            providers = self.providers.len(),
            interval_secs = interval.as_secs(),
            "Starting scheduled runs"
        );
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let outcomes = self.run_once().await;
                    let failed = outcomes.iter().filter(|o| o.is_err()).count();
                    info!(
                        providers = outcomes.len(),
                        failed = failed,
                        "Scheduled tick complete"
                    );
                }
            }
        }
    }
}
