//! Object storage bucket provider.
//!
//! Bucket listings do not carry tags, so every listed bucket costs one
//! extra tagging lookup before it can be mapped. The bucket ARN is
//! synthesized from the name; buckets without a name are skipped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::arn::{arn_to_name, console_link};
use crate::catalog::CatalogConnection;
use crate::cloud::S3ApiFactory;
use crate::config::ProviderSettings;
use crate::credentials::CredentialResolver;
use crate::entity::{
    default_annotations, EntityMetadata, EntitySpec, ResourceEntity, ANNOTATION_S3_BUCKET_ARN,
    ANNOTATION_VIEW_URL,
};
use crate::error::SyncResult;
use crate::fetch::fetch_page;
use crate::provider::{apply_full_mutation, Provider, ProviderBase, RunOptions, RunSummary};
use crate::tags::{
    labels_from_tags, owner_from_tags, relationships_from_tags, LabelValueMapper, ResourceTag,
};

/// Buckets are listed in pages of this size.
const PAGE_SIZE: i32 = 100;

const NAME_PREFIX: &str = "aws-s3-bucket";

/// Spec type stamped on every bucket entity.
pub const RESOURCE_TYPE: &str = "s3-bucket";

/// Provides catalog entities for the object storage buckets of one account.
pub struct S3BucketProvider {
    base: ProviderBase,
    factory: Arc<dyn S3ApiFactory>,
}

impl std::fmt::Debug for S3BucketProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BucketProvider")
            .field("identity", &self.base.identity)
            .finish_non_exhaustive()
    }
}

impl S3BucketProvider {
    /// Build a provider from one configuration entry; missing required
    /// fields fail here.
    pub fn from_config(
        settings: &ProviderSettings,
        credentials: Arc<dyn CredentialResolver>,
        factory: Arc<dyn S3ApiFactory>,
        options: RunOptions,
    ) -> SyncResult<Self> {
        Ok(Self {
            base: ProviderBase::from_settings(settings, credentials, options)?,
            factory,
        })
    }
}

#[async_trait]
impl Provider for S3BucketProvider {
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
            "Providing bucket resources"
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
                api.list_buckets(PAGE_SIZE, cursor.clone())
            })
            .await?;
            pages += 1;

            for bucket in page.items {
                let Some(name) = bucket.name else { continue };
                let tags = api.bucket_tags(&name).await?;
                entities.push(bucket_entity(
                    &name,
                    &tags,
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
            "Bucket run complete"
        );
        Ok(summary)
    }
}

/// Map one bucket to its catalog entity. Pure; the ARN is synthesized from
/// the bucket name and the console link derived from that ARN.
pub fn bucket_entity(
    name: &str,
    tags: &[ResourceTag],
    defaults: &BTreeMap<String, String>,
    owner_tag: &str,
    groups: &[String],
    mapper: Option<&LabelValueMapper>,
) -> ResourceEntity {
    let bucket_arn = format!("arn:aws:s3:::{name}");

    let mut annotations = defaults.clone();
    annotations.insert(ANNOTATION_S3_BUCKET_ARN.to_string(), bucket_arn.clone());
    if let Some(link) = console_link(&bucket_arn) {
        annotations.insert(ANNOTATION_VIEW_URL.to_string(), link);
    }

    let metadata = EntityMetadata {
        name: arn_to_name(&bucket_arn),
        title: Some(name.to_string()),
        labels: labels_from_tags(tags, mapper),
        annotations,
        extra: BTreeMap::new(),
    };
    let spec = EntitySpec {
        resource_type: RESOURCE_TYPE.to_string(),
        owner: owner_from_tags(tags, owner_tag, groups),
        relationships: relationships_from_tags(tags),
    };
    ResourceEntity::new(metadata, spec)
}
