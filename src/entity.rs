//! Catalog entity model and the annotation vocabulary attached to it.
//!
//! Serialized field names follow the catalog ingestion contract exactly;
//! changing a rename here changes the wire format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API version stamped on every emitted entity.
pub const API_VERSION: &str = "backstage.io/v1beta1";

/// Kind stamped on every emitted entity.
pub const KIND_RESOURCE: &str = "Resource";

pub const ANNOTATION_MANAGED_BY_LOCATION: &str = "backstage.io/managed-by-location";
pub const ANNOTATION_MANAGED_BY_ORIGIN_LOCATION: &str = "backstage.io/managed-by-origin-location";
pub const ANNOTATION_VIEW_URL: &str = "backstage.io/view-url";
pub const ANNOTATION_ACCOUNT_ID: &str = "amazonaws.com/account-id";
pub const ANNOTATION_EKS_CLUSTER_ARN: &str = "amazonaws.com/eks-cluster-arn";
pub const ANNOTATION_IAM_ROLE_ARN: &str = "amazonaws.com/iam-role-arn";
pub const ANNOTATION_RDS_INSTANCE_ARN: &str = "amazonaws.com/rds-instance-arn";
pub const ANNOTATION_S3_BUCKET_ARN: &str = "amazonaws.com/s3-bucket-arn";

/// A catalog resource entity as emitted by a provider run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntity {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: EntityMetadata,
    pub spec: EntitySpec,
}

impl ResourceEntity {
    /// Build a resource entity with the fixed kind and API version.
    pub fn new(metadata: EntityMetadata, spec: EntitySpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND_RESOURCE.to_string(),
            metadata,
            spec,
        }
    }
}

/// Entity metadata.
///
/// `extra` carries provider-specific facts (serialized inline, camelCase
/// keys); ordered maps keep repeated runs byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EntityMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Entity spec: the per-kind type, the owning group and derived relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub owner: String,
    #[serde(flatten)]
    pub relationships: Relationships,
}

/// Relations derived from resource tags, serialized as spec fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Relationships {
    #[serde(rename = "dependsOn", skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
    #[serde(rename = "dependencyOf", skip_serializing_if = "Option::is_none")]
    pub dependency_of: Option<Vec<String>>,
    #[serde(rename = "partOf", skip_serializing_if = "Option::is_none")]
    pub part_of: Option<Vec<String>>,
    #[serde(rename = "subcomponentOf", skip_serializing_if = "Option::is_none")]
    pub subcomponent_of: Option<Vec<String>>,
}

/// Annotations merged into every entity of a run.
///
/// Computed once per run from the account and the discovery region; the
/// management-location pair ties the entity back to the provider that owns
/// it.
pub fn default_annotations(account_id: &str, region: &str) -> BTreeMap<String, String> {
    let location = format!("aws:{account_id}:{region}");
    let mut annotations = BTreeMap::new();
    annotations.insert(ANNOTATION_MANAGED_BY_LOCATION.to_string(), location.clone());
    annotations.insert(ANNOTATION_MANAGED_BY_ORIGIN_LOCATION.to_string(), location);
    annotations.insert(ANNOTATION_ACCOUNT_ID.to_string(), account_id.to_string());
    annotations
}
