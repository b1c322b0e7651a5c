//! Provider contract and the run scaffolding shared by all resource kinds.
//!
//! A provider is constructed from configuration (fail-fast validation),
//! attached to a catalog connection exactly once, and then run any number of
//! times. Each run stands alone: resolve credentials, connect a service
//! client, walk the pages, map records to entities and apply one full
//! mutation. A run that fails at any step applies nothing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::catalog::{CatalogConnection, EntityMutation};
use crate::config::ProviderSettings;
use crate::credentials::{AwsCredentials, CredentialResolver};
use crate::entity::ResourceEntity;
use crate::error::{SyncError, SyncResult};
use crate::fetch::RetryPolicy;
use crate::tags::LabelValueMapper;

/// Immutable identity of a provider instance: which account, role and
/// region it discovers resources for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub account_id: String,
    pub role_name: String,
    pub role_arn: Option<String>,
    pub external_id: Option<String>,
    pub region: String,
}

impl ProviderIdentity {
    /// The role to assume for temporary credentials: the explicit ARN when
    /// configured, otherwise synthesized from account id and role name.
    pub fn assume_role_arn(&self) -> String {
        match &self.role_arn {
            Some(arn) => arn.clone(),
            None => format!("arn:aws:iam::{}:role/{}", self.account_id, self.role_name),
        }
    }
}

/// Runtime knobs shared by all providers: cancellation, page retry bounds
/// and the optional label value hook.
#[derive(Clone, Default)]
pub struct RunOptions {
    pub cancel: CancellationToken,
    pub retry: RetryPolicy,
    pub label_value_mapper: Option<LabelValueMapper>,
}

/// Summary of one completed provider run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub provider: String,
    pub run_id: Uuid,
    pub entities: usize,
    pub pages: usize,
    pub duration: Duration,
}

/// Contract every resource provider implements.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name; doubles as the location key on every mutation
    /// this provider emits.
    fn provider_name(&self) -> String;

    /// Attach the catalog connection. Must happen before [`Provider::run`].
    fn attach(&mut self, connection: CatalogConnection);

    /// Execute one discovery run, optionally overriding the discovery
    /// region for this run only.
    async fn run(&self, region_override: Option<&str>) -> SyncResult<RunSummary>;
}

/// State common to every provider implementation. Providers embed this and
/// delegate identity, naming, attachment and credential resolution to it.
pub(crate) struct ProviderBase {
    pub identity: ProviderIdentity,
    pub provider_id: Option<String>,
    pub owner_tag: Option<String>,
    pub use_temporary_credentials: bool,
    pub options: RunOptions,
    pub credentials: Arc<dyn CredentialResolver>,
    pub connection: Option<CatalogConnection>,
}

impl ProviderBase {
    /// Validate settings and build the shared state. Missing `account_id`,
    /// `role_name` or `region` fail here, before anything talks to a
    /// network.
    pub fn from_settings(
        settings: &ProviderSettings,
        credentials: Arc<dyn CredentialResolver>,
        options: RunOptions,
    ) -> SyncResult<Self> {
        let identity = ProviderIdentity {
            account_id: require(settings.account_id.as_deref(), "account_id")?,
            role_name: require(settings.role_name.as_deref(), "role_name")?,
            region: require(settings.region.as_deref(), "region")?,
            role_arn: settings.role_arn.clone(),
            external_id: settings.external_id.clone(),
        };
        Ok(Self {
            identity,
            provider_id: settings.provider_id.clone(),
            owner_tag: settings.owner_tag.clone(),
            use_temporary_credentials: settings.use_temporary_credentials,
            options,
            credentials,
            connection: None,
        })
    }

    pub fn provider_name(&self, prefix: &str) -> String {
        format!(
            "{prefix}-{}-{}",
            self.identity.account_id,
            self.provider_id.as_deref().unwrap_or("0")
        )
    }

    pub fn owner_tag(&self) -> &str {
        self.owner_tag.as_deref().unwrap_or("owner")
    }

    pub fn attach(&mut self, connection: CatalogConnection) {
        self.connection = Some(connection);
    }

    pub fn connection(&self) -> SyncResult<&CatalogConnection> {
        self.connection.as_ref().ok_or(SyncError::NotInitialized)
    }

    pub fn discovery_region<'a>(&'a self, region_override: Option<&'a str>) -> &'a str {
        region_override.unwrap_or(&self.identity.region)
    }

    pub async fn resolve_credentials(&self) -> SyncResult<AwsCredentials> {
        self.credentials
            .resolve(&self.identity, self.use_temporary_credentials)
            .await
    }

    pub fn label_value_mapper(&self) -> Option<&LabelValueMapper> {
        self.options.label_value_mapper.as_ref()
    }
}

fn require(value: Option<&str>, field: &str) -> SyncResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(SyncError::config(format!(
            "provider is missing required field '{field}'"
        ))),
    }
}

/// Finish a run: flag truncation collisions, build the full mutation and
/// apply it as one catalog write.
pub(crate) async fn apply_full_mutation(
    connection: &CatalogConnection,
    provider_name: &str,
    run_id: Uuid,
    started: Instant,
    entities: Vec<ResourceEntity>,
    pages: usize,
) -> SyncResult<RunSummary> {
    warn_on_name_collisions(provider_name, &entities);
    let count = entities.len();
    let mutation = EntityMutation::full(provider_name, entities);
    connection.apply_mutation(&mutation).await?;
    Ok(RunSummary {
        provider: provider_name.to_string(),
        run_id,
        entities: count,
        pages,
        duration: started.elapsed(),
    })
}

fn warn_on_name_collisions(provider: &str, entities: &[ResourceEntity]) {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for entity in entities {
        let title = entity
            .metadata
            .title
            .as_deref()
            .unwrap_or(&entity.metadata.name);
        if let Some(previous) = seen.insert(entity.metadata.name.as_str(), title) {
            warn!(
                provider = %provider,
                name = %entity.metadata.name,
                first = %previous,
                second = %title,
                "Entity names collide after truncation"
            );
        }
    }
}
