//! Managed database instance provider.
//!
//! Instance pages are self-contained, so this is the simplest fetch plan:
//! one paginated describe call, no secondary lookups. Records missing the
//! instance identifier or ARN are skipped, never an error.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::arn::{arn_to_name, console_link};
use crate::catalog::CatalogConnection;
use crate::cloud::{DbInstanceRecord, RdsApiFactory};
use crate::config::ProviderSettings;
use crate::credentials::CredentialResolver;
use crate::entity::{
    default_annotations, EntityMetadata, EntitySpec, ResourceEntity, ANNOTATION_RDS_INSTANCE_ARN,
    ANNOTATION_VIEW_URL,
};
use crate::error::SyncResult;
use crate::fetch::fetch_page;
use crate::provider::{apply_full_mutation, Provider, ProviderBase, RunOptions, RunSummary};
use crate::tags::{labels_from_tags, owner_from_tags, relationships_from_tags, LabelValueMapper};

/// Instances are described in pages of this size.
const PAGE_SIZE: i32 = 100;

const NAME_PREFIX: &str = "aws-rds-provider";

/// Spec type stamped on every database instance entity.
pub const RESOURCE_TYPE: &str = "rds-instance";

/// Provides catalog entities for the managed database instances of one
/// account and region.
pub struct RdsInstanceProvider {
    base: ProviderBase,
    factory: Arc<dyn RdsApiFactory>,
}

impl RdsInstanceProvider {
    /// Build a provider from one configuration entry; missing required
    /// fields fail here.
    pub fn from_config(
        settings: &ProviderSettings,
        credentials: Arc<dyn CredentialResolver>,
        factory: Arc<dyn RdsApiFactory>,
        options: RunOptions,
    ) -> SyncResult<Self> {
        Ok(Self {
            base: ProviderBase::from_settings(settings, credentials, options)?,
            factory,
        })
    }
}

#[async_trait]
impl Provider for RdsInstanceProvider {
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
            "Providing database resources"
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
                api.describe_db_instances(PAGE_SIZE, cursor.clone())
            })
            .await?;
            pages += 1;

            for record in page.items {
                if let Some(entity) = db_instance_entity(
                    &record,
                    &defaults,
                    self.base.owner_tag(),
                    &groups,
                    self.base.label_value_mapper(),
                ) {
                    entities.push(entity);
                }
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
            "Database run complete"
        );
        Ok(summary)
    }
}

/// Map one instance record to its catalog entity.
///
/// Returns `None` when the identifying fields are absent. Instance facts
/// land as camelCase metadata extras; absent facts are omitted rather than
/// serialized as null.
pub fn db_instance_entity(
    record: &DbInstanceRecord,
    defaults: &BTreeMap<String, String>,
    owner_tag: &str,
    groups: &[String],
    mapper: Option<&LabelValueMapper>,
) -> Option<ResourceEntity> {
    let instance_id = record.instance_id.as_deref()?;
    let instance_arn = record.instance_arn.as_deref()?;

    let mut annotations = defaults.clone();
    if let Some(link) = console_link(instance_arn) {
        annotations.insert(ANNOTATION_VIEW_URL.to_string(), link);
    }
    annotations.insert(
        ANNOTATION_RDS_INSTANCE_ARN.to_string(),
        instance_arn.to_string(),
    );

    let mut extra = BTreeMap::new();
    insert_fact(&mut extra, "dbInstanceClass", record.instance_class.clone());
    insert_fact(&mut extra, "dbEngine", record.engine.clone());
    insert_fact(&mut extra, "dbEngineVersion", record.engine_version.clone());
    insert_fact(&mut extra, "allocatedStorage", record.allocated_storage);
    insert_fact(
        &mut extra,
        "preferredMaintenanceWindow",
        record.preferred_maintenance_window.clone(),
    );
    insert_fact(
        &mut extra,
        "preferredBackupWindow",
        record.preferred_backup_window.clone(),
    );
    insert_fact(
        &mut extra,
        "backupRetentionPeriod",
        record.backup_retention_period,
    );
    insert_fact(&mut extra, "isMultiAz", record.multi_az);
    insert_fact(
        &mut extra,
        "automaticMinorVersionUpgrade",
        record.auto_minor_version_upgrade,
    );
    insert_fact(
        &mut extra,
        "isPubliclyAccessible",
        record.publicly_accessible,
    );
    insert_fact(&mut extra, "storageType", record.storage_type.clone());
    insert_fact(
        &mut extra,
        "isPerformanceInsightsEnabled",
        record.performance_insights_enabled,
    );

    let metadata = EntityMetadata {
        name: arn_to_name(instance_id),
        title: Some(instance_id.to_string()),
        labels: labels_from_tags(&record.tags, mapper),
        annotations,
        extra,
    };
    let spec = EntitySpec {
        resource_type: RESOURCE_TYPE.to_string(),
        owner: owner_from_tags(&record.tags, owner_tag, groups),
        relationships: relationships_from_tags(&record.tags),
    };
    Some(ResourceEntity::new(metadata, spec))
}

fn insert_fact<V: Into<Value>>(extra: &mut BTreeMap<String, Value>, key: &str, value: Option<V>) {
    if let Some(value) = value {
        extra.insert(key.to_string(), value.into());
    }
}
