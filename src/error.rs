//! Error types for resource ingestion runs.

use thiserror::Error;

/// Errors that can occur while ingesting cloud resources into the catalog.
///
/// Every variant aborts the run it occurs in before any catalog write; a
/// failed run never applies a partial entity set.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Provider configuration is invalid or incomplete.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Credential acquisition or role assumption failed.
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// A cloud listing or describe call failed. `throttled` marks
    /// rate-limit responses, which are the only fetch errors retried.
    #[error("Fetch error: {message}")]
    Fetch { message: String, throttled: bool },

    /// The provider was run before a catalog connection was attached.
    #[error("Provider not initialized: attach a catalog connection before running")]
    NotInitialized,

    /// The catalog rejected a mutation or a group listing failed.
    #[error("Catalog error: {message}")]
    Catalog { message: String },

    /// Cooperative cancellation was observed at a page boundary.
    #[error("Run cancelled")]
    Cancelled,

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a non-throttle fetch error.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
            throttled: false,
        }
    }

    /// Create a throttle-classified fetch error.
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
            throttled: true,
        }
    }

    /// Create a catalog error.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }

    /// Check if this error is a rate-limit response worth retrying.
    pub fn is_throttle(&self) -> bool {
        matches!(self, SyncError::Fetch { throttled: true, .. })
    }
}

/// Result type for ingestion operations.
pub type SyncResult<T> = Result<T, SyncError>;
