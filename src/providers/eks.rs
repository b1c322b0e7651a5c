//! Kubernetes cluster provider.
//!
//! The cluster listing returns names only, so each listed name costs one
//! describe call before mapping. Pages are kept small for that reason.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::arn::arn_to_name;
use crate::catalog::CatalogConnection;
use crate::cloud::{ClusterRecord, EksApiFactory};
use crate::config::ProviderSettings;
use crate::credentials::CredentialResolver;
use crate::entity::{
    default_annotations, EntityMetadata, EntitySpec, ResourceEntity, ANNOTATION_EKS_CLUSTER_ARN,
    ANNOTATION_IAM_ROLE_ARN,
};
use crate::error::SyncResult;
use crate::fetch::fetch_page;
use crate::provider::{apply_full_mutation, Provider, ProviderBase, RunOptions, RunSummary};
use crate::tags::{labels_from_tags, owner_from_tags, relationships_from_tags, LabelValueMapper};

/// Cluster names are listed in pages of this size; each name triggers a
/// describe call.
const PAGE_SIZE: i32 = 25;

const NAME_PREFIX: &str = "aws-eks-cluster";

/// Spec type stamped on every cluster entity.
pub const RESOURCE_TYPE: &str = "eks-cluster";

/// Provides catalog entities for the Kubernetes clusters of one account and
/// region.
pub struct EksClusterProvider {
    base: ProviderBase,
    factory: Arc<dyn EksApiFactory>,
}

impl EksClusterProvider {
    /// Build a provider from one configuration entry; missing required
    /// fields fail here.
    pub fn from_config(
        settings: &ProviderSettings,
        credentials: Arc<dyn CredentialResolver>,
        factory: Arc<dyn EksApiFactory>,
        options: RunOptions,
    ) -> SyncResult<Self> {
        Ok(Self {
            base: ProviderBase::from_settings(settings, credentials, options)?,
            factory,
        })
    }
}

#[async_trait]
impl Provider for EksClusterProvider {
    fn provider_name(&self) -> String {
        self.base.provider_name(NAME_PREFIX)
    }

    fn attach(&mut self, connection: CatalogConnection) {
        self.base.attach(connection);
    }

    async fn run(&self, region_override: Option<&str>) -> SyncResult<RunSummary> {
        let connection = self.base.connection()?.clone();
        let run_id = Uuid::new_v4();
        let provider = self.provider_name();
        let started = Instant::now();
        let region = self.base.discovery_region(region_override);

        info!(
            provider = %provider,
            run_id = %run_id,
            account_id = %self.base.identity.account_id,
            region = %region,
            "Providing cluster resources"
        );

        let groups = connection.list_groups().await?;
        let credentials = self.base.resolve_credentials().await?;
        let api = self.factory.connect(&credentials, region).await?;
        let defaults = default_annotations(&self.base.identity.account_id, region);

        let mut entities = Vec::new();
        let mut pages = 0usize;
        let mut cursor: Option<String> = None;

        loop {
            let page = fetch_page(&self.base.options.cancel, &self.base.options.retry, || {
                api.list_cluster_names(PAGE_SIZE, cursor.clone())
            })
            .await?;
            pages += 1;

            for name in page.items {
                if name.is_empty() {
                    continue;
                }
                let record = api.describe_cluster(&name).await?;
                entities.push(cluster_entity(
                    &record,
                    &defaults,
                    self.base.owner_tag(),
                    &groups,
                    self.base.label_value_mapper(),
                ));
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let summary =
            apply_full_mutation(&connection, &provider, run_id, started, entities, pages).await?;
        info!(
            provider = %provider,
            run_id = %run_id,
            entities = summary.entities,
            pages = summary.pages,
            "Cluster run complete"
        );
        Ok(summary)
    }
}

/// Map one cluster record to its catalog entity.
///
/// The cluster and role ARN annotations are only set when the describe call
/// reported them.
pub fn cluster_entity(
    record: &ClusterRecord,
    defaults: &BTreeMap<String, String>,
    owner_tag: &str,
    groups: &[String],
    mapper: Option<&LabelValueMapper>,
) -> ResourceEntity {
    let mut annotations = defaults.clone();
    if let Some(arn) = &record.arn {
        annotations.insert(ANNOTATION_EKS_CLUSTER_ARN.to_string(), arn.clone());
    }
    if let Some(role_arn) = &record.role_arn {
        annotations.insert(ANNOTATION_IAM_ROLE_ARN.to_string(), role_arn.clone());
    }

    let metadata = EntityMetadata {
        name: arn_to_name(&record.name),
        title: Some(record.name.clone()),
        labels: labels_from_tags(&record.tags, mapper),
        annotations,
        extra: BTreeMap::new(),
    };
    let spec = EntitySpec {
        resource_type: RESOURCE_TYPE.to_string(),
        owner: owner_from_tags(&record.tags, owner_tag, groups),
        relationships: relationships_from_tags(&record.tags),
    };
    ResourceEntity::new(metadata, spec)
}
