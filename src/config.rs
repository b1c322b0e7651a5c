//! Static configuration model for the sync service.
//!
//! The YAML file carries no secrets; the catalog token and any static AWS
//! keys come from the environment. Provider settings are deliberately loose
//! here (everything optional): required fields are enforced when a provider
//! is constructed, so a bad entry fails fast with a configuration error
//! instead of a serde error.

use serde::Deserialize;

/// Top-level configuration: one catalog, one schedule, many providers.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
}

/// Where mutations are sent.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogConfig {
    pub base_url: String,
}

/// How often every provider runs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
        }
    }
}

fn default_interval_seconds() -> u64 {
    1800
}

/// Which resource kind a configured provider ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    EksCluster,
    RdsInstance,
    S3Bucket,
}

/// One provider entry from the configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub role_arn: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub owner_tag: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub use_temporary_credentials: bool,
}
