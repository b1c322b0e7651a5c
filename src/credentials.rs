//! Credential acquisition for provider runs.
//!
//! Providers never talk to a credential source directly; they resolve
//! through the [`CredentialResolver`] trait once per run. A resolution
//! failure aborts that run and is surfaced as an authentication error, never
//! retried at this boundary.

use async_trait::async_trait;
use mockall::{automock, predicate::*};

use crate::error::{SyncError, SyncResult};
use crate::provider::ProviderIdentity;

/// A set of AWS credentials usable to construct service clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Resolves credentials for a provider identity.
///
/// `temporary` requests short-lived credentials scoped to the identity's
/// role chain; `false` asks for long-lived credentials usable across
/// regions. Implemented by the STS resolver for production and by mocks in
/// tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(
        &self,
        identity: &ProviderIdentity,
        temporary: bool,
    ) -> SyncResult<AwsCredentials>;
}

/// Resolver backed by static keys from the process environment.
///
/// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
/// `AWS_SESSION_TOKEN` once at construction and hands them out for every
/// identity. Useful for single-account deployments and local runs.
#[derive(Debug)]
pub struct EnvCredentialResolver {
    credentials: AwsCredentials,
}

impl EnvCredentialResolver {
    pub fn new_from_env() -> SyncResult<Self> {
        dotenvy::dotenv().ok();
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| SyncError::auth("AWS_ACCESS_KEY_ID environment variable not set"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| SyncError::auth("AWS_SECRET_ACCESS_KEY environment variable not set"))?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();
        Ok(Self {
            credentials: AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token,
            },
        })
    }
}

#[async_trait]
impl CredentialResolver for EnvCredentialResolver {
    async fn resolve(
        &self,
        _identity: &ProviderIdentity,
        _temporary: bool,
    ) -> SyncResult<AwsCredentials> {
        Ok(self.credentials.clone())
    }
}
