//! Cloud API seams: the per-service traits providers fetch through.
//!
//! Each service gets a narrow trait returning plain records, plus a factory
//! trait that builds a connected client from resolved credentials and a
//! discovery region. Real implementations live in [`crate::sdk`]; the traits
//! are annotated for `mockall` so tests can script every page and describe
//! call deterministically.

use async_trait::async_trait;
use mockall::{automock, predicate::*};

use crate::credentials::AwsCredentials;
use crate::error::SyncResult;
use crate::fetch::Page;
use crate::tags::ResourceTag;

/// A Kubernetes cluster as reported by the cluster service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterRecord {
    pub name: String,
    pub arn: Option<String>,
    pub role_arn: Option<String>,
    pub tags: Vec<ResourceTag>,
}

/// A managed database instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbInstanceRecord {
    pub instance_id: Option<String>,
    pub instance_arn: Option<String>,
    pub instance_class: Option<String>,
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub allocated_storage: Option<i32>,
    pub preferred_maintenance_window: Option<String>,
    pub preferred_backup_window: Option<String>,
    pub backup_retention_period: Option<i32>,
    pub multi_az: Option<bool>,
    pub auto_minor_version_upgrade: Option<bool>,
    pub publicly_accessible: Option<bool>,
    pub storage_type: Option<String>,
    pub performance_insights_enabled: Option<bool>,
    pub tags: Vec<ResourceTag>,
}

/// An object storage bucket from the bucket listing.
///
/// Tags are not part of the listing; they are fetched per bucket through
/// [`S3Api::bucket_tags`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BucketRecord {
    pub name: Option<String>,
}

/// Cluster service operations used during discovery.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait EksApi: Send + Sync {
    /// List one page of cluster names.
    async fn list_cluster_names(
        &self,
        page_size: i32,
        cursor: Option<String>,
    ) -> SyncResult<Page<String>>;

    /// Fetch the full record for a listed cluster name.
    async fn describe_cluster(&self, name: &str) -> SyncResult<ClusterRecord>;
}

/// Database service operations used during discovery.
///
/// Instance pages are self-contained: every record carries all the facts
/// the mapper needs, no secondary call required.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RdsApi: Send + Sync {
    async fn describe_db_instances(
        &self,
        page_size: i32,
        cursor: Option<String>,
    ) -> SyncResult<Page<DbInstanceRecord>>;
}

/// Bucket service operations used during discovery.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait S3Api: Send + Sync {
    /// List one page of buckets.
    async fn list_buckets(
        &self,
        page_size: i32,
        cursor: Option<String>,
    ) -> SyncResult<Page<BucketRecord>>;

    /// Fetch the tag set of a bucket; a bucket without tags yields an empty
    /// list rather than an error.
    async fn bucket_tags(&self, bucket: &str) -> SyncResult<Vec<ResourceTag>>;
}

/// Builds a connected cluster service client for one run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait EksApiFactory: Send + Sync {
    async fn connect(
        &self,
        credentials: &AwsCredentials,
        region: &str,
    ) -> SyncResult<Box<dyn EksApi>>;
}

/// Builds a connected database service client for one run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RdsApiFactory: Send + Sync {
    async fn connect(
        &self,
        credentials: &AwsCredentials,
        region: &str,
    ) -> SyncResult<Box<dyn RdsApi>>;
}

/// Builds a connected bucket service client for one run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait S3ApiFactory: Send + Sync {
    async fn connect(
        &self,
        credentials: &AwsCredentials,
        region: &str,
    ) -> SyncResult<Box<dyn S3Api>>;
}
