//! Catalog ingestion: mutation wire types and the client trait providers
//! reconcile through.
//!
//! A provider run produces exactly one full mutation; the catalog replaces
//! everything previously filed under the same location key with the new
//! entity set. The trait is annotated for `mockall` so tests can assert on
//! the exact mutation a run produces.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};

use crate::entity::ResourceEntity;
use crate::error::{SyncError, SyncResult};

/// A full-replace mutation for one provider's entity set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMutation {
    #[serde(rename = "type")]
    pub mutation_type: String,
    pub entities: Vec<MutationEntry>,
}

/// One entity of a mutation, keyed to the provider that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEntry {
    pub entity: ResourceEntity,
    #[serde(rename = "locationKey")]
    pub location_key: String,
}

impl EntityMutation {
    /// The only mutation type providers emit.
    pub const FULL: &'static str = "full";

    /// Build a full mutation filing every entity under `location_key`.
    pub fn full(location_key: &str, entities: Vec<ResourceEntity>) -> Self {
        Self {
            mutation_type: Self::FULL.to_string(),
            entities: entities
                .into_iter()
                .map(|entity| MutationEntry {
                    entity,
                    location_key: location_key.to_string(),
                })
                .collect(),
        }
    }
}

/// Catalog operations a provider needs: applying mutations and listing the
/// groups owner resolution checks against.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Apply one full mutation. All-or-nothing from the caller's view.
    async fn apply_mutation(&self, mutation: &EntityMutation) -> SyncResult<()>;

    /// List known group names. An empty list disables owner membership
    /// checking.
    async fn list_groups(&self) -> SyncResult<Vec<String>>;
}

/// Shared handle providers hold once attached.
pub type CatalogConnection = Arc<dyn CatalogClient>;

#[derive(Debug, Deserialize)]
struct GroupsResponse {
    items: Vec<GroupRef>,
}

#[derive(Debug, Deserialize)]
struct GroupRef {
    name: String,
}

/// HTTP implementation of [`CatalogClient`] against the catalog's REST
/// ingestion endpoints, authenticating with an optional bearer token.
pub struct RestCatalogClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestCatalogClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    /// Construct from `CATALOG_BASE_URL` and the optional `CATALOG_TOKEN`.
    pub fn new_from_env() -> SyncResult<Self> {
        dotenvy::dotenv().ok();
        let base_url = std::env::var("CATALOG_BASE_URL")
            .map_err(|_| SyncError::config("CATALOG_BASE_URL environment variable not set"))?;
        let token = std::env::var("CATALOG_TOKEN").ok();
        Ok(Self::new(base_url, token))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl CatalogClient for RestCatalogClient {
    async fn apply_mutation(&self, mutation: &EntityMutation) -> SyncResult<()> {
        let url = format!("{}/api/catalog/mutations", self.base_url);
        let response = self
            .authorize(self.http.post(&url).json(mutation))
            .send()
            .await
            .map_err(|e| SyncError::catalog(format!("mutation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::catalog(format!(
                "mutation rejected: HTTP {status}: {body}"
            )));
        }
        Ok(())
    }

    async fn list_groups(&self) -> SyncResult<Vec<String>> {
        let url = format!("{}/api/catalog/groups", self.base_url);
        let response = self
            .authorize(self.http.get(&url))
            .send()
            .await
            .map_err(|e| SyncError::catalog(format!("group listing failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::catalog(format!(
                "group listing rejected: HTTP {status}"
            )));
        }

        let groups: GroupsResponse = response
            .json()
            .await
            .map_err(|e| SyncError::catalog(format!("group listing returned invalid body: {e}")))?;
        Ok(groups.items.into_iter().map(|group| group.name).collect())
    }
}
