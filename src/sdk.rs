//! AWS-backed implementations of the credential and cloud API seams.
//!
//! Everything that names an SDK type lives in this module. Adapters
//! translate SDK paging tokens into [`Page`] values and classify throttling
//! responses so the fetch layer can retry them; nothing outside this module
//! depends on SDK error shapes.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_eks::error::{DisplayErrorContext, ProvideErrorMetadata};
use tracing::debug;

use crate::cloud::{
    BucketRecord, ClusterRecord, DbInstanceRecord, EksApi, EksApiFactory, RdsApi, RdsApiFactory,
    S3Api, S3ApiFactory,
};
use crate::credentials::{AwsCredentials, CredentialResolver};
use crate::error::{SyncError, SyncResult};
use crate::fetch::Page;
use crate::provider::ProviderIdentity;
use crate::tags::ResourceTag;

const CREDENTIALS_PROVIDER_NAME: &str = "aws-catalog-sync";

const THROTTLE_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
];

fn fetch_error(operation: &str, code: Option<&str>, detail: impl std::fmt::Display) -> SyncError {
    let message = format!("{operation}: {detail}");
    if code.is_some_and(|c| THROTTLE_CODES.contains(&c)) {
        SyncError::throttled(message)
    } else {
        SyncError::fetch(message)
    }
}

fn service_credentials(credentials: &AwsCredentials) -> aws_credential_types::Credentials {
    aws_credential_types::Credentials::new(
        credentials.access_key_id.clone(),
        credentials.secret_access_key.clone(),
        credentials.session_token.clone(),
        None,
        CREDENTIALS_PROVIDER_NAME,
    )
}

/// Resolver that assumes the provider's role through STS for temporary
/// credentials, or hands out the ambient chain's credentials otherwise.
pub struct StsCredentialResolver {
    session_name: String,
}

impl StsCredentialResolver {
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
        }
    }
}

impl Default for StsCredentialResolver {
    fn default() -> Self {
        Self::new(CREDENTIALS_PROVIDER_NAME)
    }
}

#[async_trait]
impl CredentialResolver for StsCredentialResolver {
    async fn resolve(
        &self,
        identity: &ProviderIdentity,
        temporary: bool,
    ) -> SyncResult<AwsCredentials> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(identity.region.clone()))
            .load()
            .await;

        if !temporary {
            let provider = sdk_config
                .credentials_provider()
                .ok_or_else(|| SyncError::auth("no ambient credential provider available"))?;
            let creds = provider.provide_credentials().await.map_err(|e| {
                SyncError::auth(format!("ambient credential resolution failed: {e}"))
            })?;
            return Ok(AwsCredentials {
                access_key_id: creds.access_key_id().to_string(),
                secret_access_key: creds.secret_access_key().to_string(),
                session_token: creds.session_token().map(str::to_string),
            });
        }

        let role_arn = identity.assume_role_arn();
        debug!(
            role_arn = %role_arn,
            region = %identity.region,
            "Assuming role for temporary credentials"
        );
        let sts = aws_sdk_sts::Client::new(&sdk_config);
        let mut request = sts
            .assume_role()
            .role_arn(&role_arn)
            .role_session_name(&self.session_name);
        if let Some(external_id) = &identity.external_id {
            request = request.external_id(external_id);
        }
        let output = request.send().await.map_err(|e| {
            SyncError::auth(format!(
                "assume role {role_arn} failed: {}",
                DisplayErrorContext(&e)
            ))
        })?;
        let creds = output.credentials().ok_or_else(|| {
            SyncError::auth(format!("assume role {role_arn} returned no credentials"))
        })?;
        Ok(AwsCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: Some(creds.session_token().to_string()),
        })
    }
}

/// Cluster service adapter.
pub struct SdkEksApi {
    client: aws_sdk_eks::Client,
}

#[async_trait]
impl EksApi for SdkEksApi {
    async fn list_cluster_names(
        &self,
        page_size: i32,
        cursor: Option<String>,
    ) -> SyncResult<Page<String>> {
        let output = self
            .client
            .list_clusters()
            .max_results(page_size)
            .set_next_token(cursor)
            .send()
            .await
            .map_err(|e| fetch_error("list clusters", e.code(), DisplayErrorContext(&e)))?;
        Ok(Page::new(
            output.clusters.unwrap_or_default(),
            output.next_token,
        ))
    }

    async fn describe_cluster(&self, name: &str) -> SyncResult<ClusterRecord> {
        let output = self
            .client
            .describe_cluster()
            .name(name)
            .send()
            .await
            .map_err(|e| fetch_error("describe cluster", e.code(), DisplayErrorContext(&e)))?;
        let cluster = output
            .cluster
            .ok_or_else(|| SyncError::fetch(format!("describe cluster {name}: empty response")))?;

        let mut tags: Vec<ResourceTag> = cluster
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| ResourceTag::new(key, value))
            .collect();
        // The service reports tags as an unordered map.
        tags.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(ClusterRecord {
            name: cluster.name.unwrap_or_else(|| name.to_string()),
            arn: cluster.arn,
            role_arn: cluster.role_arn,
            tags,
        })
    }
}

/// Builds [`SdkEksApi`] clients from resolved credentials.
pub struct SdkEksApiFactory;

#[async_trait]
impl EksApiFactory for SdkEksApiFactory {
    async fn connect(
        &self,
        credentials: &AwsCredentials,
        region: &str,
    ) -> SyncResult<Box<dyn EksApi>> {
        let config = aws_sdk_eks::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(service_credentials(credentials))
            .build();
        Ok(Box::new(SdkEksApi {
            client: aws_sdk_eks::Client::from_conf(config),
        }))
    }
}

/// Database service adapter.
pub struct SdkRdsApi {
    client: aws_sdk_rds::Client,
}

#[async_trait]
impl RdsApi for SdkRdsApi {
    async fn describe_db_instances(
        &self,
        page_size: i32,
        cursor: Option<String>,
    ) -> SyncResult<Page<DbInstanceRecord>> {
        let output = self
            .client
            .describe_db_instances()
            .max_records(page_size)
            .set_marker(cursor)
            .send()
            .await
            .map_err(|e| fetch_error("describe db instances", e.code(), DisplayErrorContext(&e)))?;
        let items = output
            .db_instances
            .unwrap_or_default()
            .into_iter()
            .map(db_instance_record)
            .collect();
        Ok(Page::new(items, output.marker))
    }
}

fn db_instance_record(instance: aws_sdk_rds::types::DbInstance) -> DbInstanceRecord {
    let tags = instance
        .tag_list
        .unwrap_or_default()
        .into_iter()
        .filter_map(|tag| match (tag.key, tag.value) {
            (Some(key), Some(value)) => Some(ResourceTag::new(key, value)),
            _ => None,
        })
        .collect();
    DbInstanceRecord {
        instance_id: instance.db_instance_identifier,
        instance_arn: instance.db_instance_arn,
        instance_class: instance.db_instance_class,
        engine: instance.engine,
        engine_version: instance.engine_version,
        allocated_storage: instance.allocated_storage,
        preferred_maintenance_window: instance.preferred_maintenance_window,
        preferred_backup_window: instance.preferred_backup_window,
        backup_retention_period: instance.backup_retention_period,
        multi_az: instance.multi_az,
        auto_minor_version_upgrade: instance.auto_minor_version_upgrade,
        publicly_accessible: instance.publicly_accessible,
        storage_type: instance.storage_type,
        performance_insights_enabled: instance.performance_insights_enabled,
        tags,
    }
}

/// Builds [`SdkRdsApi`] clients from resolved credentials.
pub struct SdkRdsApiFactory;

#[async_trait]
impl RdsApiFactory for SdkRdsApiFactory {
    async fn connect(
        &self,
        credentials: &AwsCredentials,
        region: &str,
    ) -> SyncResult<Box<dyn RdsApi>> {
        let config = aws_sdk_rds::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(service_credentials(credentials))
            .build();
        Ok(Box::new(SdkRdsApi {
            client: aws_sdk_rds::Client::from_conf(config),
        }))
    }
}

/// Bucket service adapter.
pub struct SdkS3Api {
    client: aws_sdk_s3::Client,
}

#[async_trait]
impl S3Api for SdkS3Api {
    async fn list_buckets(
        &self,
        page_size: i32,
        cursor: Option<String>,
    ) -> SyncResult<Page<BucketRecord>> {
        let output = self
            .client
            .list_buckets()
            .max_buckets(page_size)
            .set_continuation_token(cursor)
            .send()
            .await
            .map_err(|e| fetch_error("list buckets", e.code(), DisplayErrorContext(&e)))?;
        let items = output
            .buckets
            .unwrap_or_default()
            .into_iter()
            .map(|bucket| BucketRecord { name: bucket.name })
            .collect();
        Ok(Page::new(items, output.continuation_token))
    }

    async fn bucket_tags(&self, bucket: &str) -> SyncResult<Vec<ResourceTag>> {
        match self
            .client
            .get_bucket_tagging()
            .bucket(bucket)
            .send()
            .await
        {
            Ok(output) => Ok(output
                .tag_set()
                .iter()
                .map(|tag| ResourceTag::new(tag.key(), tag.value()))
                .collect()),
            // A bucket with no tag set is an empty tag list, not a failure.
            Err(e) if e.code() == Some("NoSuchTagSet") => Ok(Vec::new()),
            Err(e) => Err(fetch_error(
                "get bucket tagging",
                e.code(),
                DisplayErrorContext(&e),
            )),
        }
    }
}

/// Builds [`SdkS3Api`] clients from resolved credentials.
pub struct SdkS3ApiFactory;

#[async_trait]
impl S3ApiFactory for SdkS3ApiFactory {
    async fn connect(
        &self,
        credentials: &AwsCredentials,
        region: &str,
    ) -> SyncResult<Box<dyn S3Api>> {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(service_credentials(credentials))
            .build();
        Ok(Box::new(SdkS3Api {
            client: aws_sdk_s3::Client::from_conf(config),
        }))
    }
}
