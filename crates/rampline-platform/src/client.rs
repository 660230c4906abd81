//! Platform client seam.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::service::Service;

/// Result type alias for platform API operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors from the platform API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("service {0} not found")]
    NotFound(String),

    /// Another writer replaced the object first. Soft: the next pass
    /// recomputes from the updated state.
    #[error("write conflict for {0} (stale resource version)")]
    Conflict(String),

    #[error("platform returned status {0}")]
    Status(u16),

    #[error("platform request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to decode platform response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("platform request failed: {0}")]
    Http(String),
}

/// Read/replace access to service objects.
///
/// Implementations must be safe for concurrent use; the daemon shares one
/// client across all service workers. Calls are cancelled by dropping
/// their future, and implementations bound each call with their own
/// request deadline on top (see `HttpPlatformClient::with_request_timeout`
/// and [`ClientError::Timeout`]).
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Fetch the current form of a service.
    async fn get_service(&self, namespace: &str, name: &str) -> ClientResult<Service>;

    /// Replace a service's spec and metadata in one call, returning the
    /// canonical form. The service's resource version, when present, is the
    /// optimistic-concurrency token; a stale one yields
    /// [`ClientError::Conflict`].
    async fn replace_service(
        &self,
        namespace: &str,
        name: &str,
        svc: &Service,
    ) -> ClientResult<Service>;
}
