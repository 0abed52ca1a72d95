//! Registry client port used by the transfer pipeline.

use crate::transfer::domain::RegistryCredentials;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type for image client operations.
pub type ImageClientResult<T> = Result<T, ImageClientError>;

/// Pull, tag, push, and remove operations against a local image store and
/// remote registries.
///
/// Every call receives the transfer's cancellation token. Implementations
/// should return [`ImageClientError::Cancelled`] promptly once it fires.
#[async_trait]
pub trait ImageClient: Send + Sync {
    /// Pulls `reference` into local storage.
    ///
    /// # Errors
    ///
    /// Returns [`ImageClientError`] when the registry rejects the pull or the
    /// transport fails.
    async fn pull(&self, cancel: &CancellationToken, reference: &str) -> ImageClientResult<()>;

    /// Makes the local image `source` also available as `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageClientError::NotFound`] when `source` is not stored
    /// locally.
    async fn tag(
        &self,
        cancel: &CancellationToken,
        source: &str,
        target: &str,
    ) -> ImageClientResult<()>;

    /// Pushes the local image `reference` using `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageClientError`] when the image is missing locally, the
    /// registry rejects the credentials, or the transport fails.
    async fn push(
        &self,
        cancel: &CancellationToken,
        reference: &str,
        credentials: &RegistryCredentials,
    ) -> ImageClientResult<()>;

    /// Removes the local image `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageClientError::NotFound`] when nothing is stored under
    /// `reference`.
    async fn remove(&self, cancel: &CancellationToken, reference: &str) -> ImageClientResult<()>;
}

/// Errors returned by image client implementations.
#[derive(Debug, Clone, Error)]
pub enum ImageClientError {
    /// No local image is stored under the reference.
    #[error("image not found locally: {0}")]
    NotFound(String),

    /// The operation observed a cancelled token.
    #[error("operation cancelled")]
    Cancelled,

    /// The registry or local store refused the operation.
    #[error("{0}")]
    Rejected(String),

    /// Network or protocol failure.
    #[error("registry transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl ImageClientError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}

/// Drives `operation` to completion unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`ImageClientError::Cancelled`] when the token fires before the
/// operation completes, otherwise the operation's own result.
pub async fn run_cancellable<T, F>(cancel: &CancellationToken, operation: F) -> ImageClientResult<T>
where
    F: Future<Output = ImageClientResult<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ImageClientError::Cancelled),
        result = operation => result,
    }
}
