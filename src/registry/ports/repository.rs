//! Repository port for registry configuration persistence.

use crate::registry::domain::{RegistryConfig, RegistryConfigId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for registry configuration repository operations.
pub type RegistryConfigRepositoryResult<T> = Result<T, RegistryConfigRepositoryError>;

/// Registry configuration persistence contract.
///
/// Implementations guarantee that at most one stored configuration carries
/// the default flag: storing or updating a default clears the flag on every
/// other configuration within the same critical section or transaction.
#[async_trait]
pub trait RegistryConfigRepository: Send + Sync {
    /// Stores a new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigRepositoryError::DuplicateConfig`] when the
    /// identifier already exists.
    async fn store(&self, config: &RegistryConfig) -> RegistryConfigRepositoryResult<()>;

    /// Persists changes to an existing configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigRepositoryError::NotFound`] when the
    /// configuration does not exist.
    async fn update(&self, config: &RegistryConfig) -> RegistryConfigRepositoryResult<()>;

    /// Deletes a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigRepositoryError::NotFound`] when the
    /// configuration does not exist.
    async fn delete(&self, id: RegistryConfigId) -> RegistryConfigRepositoryResult<()>;

    /// Finds a configuration by identifier.
    async fn find_by_id(
        &self,
        id: RegistryConfigId,
    ) -> RegistryConfigRepositoryResult<Option<RegistryConfig>>;

    /// Returns every configuration, the default first and then newest first.
    async fn list(&self) -> RegistryConfigRepositoryResult<Vec<RegistryConfig>>;

    /// Returns the default configuration, if one is set.
    async fn find_default(&self) -> RegistryConfigRepositoryResult<Option<RegistryConfig>>;
}

/// Errors returned by registry configuration repository implementations.
#[derive(Debug, Clone, Error)]
pub enum RegistryConfigRepositoryError {
    /// A configuration with the same identifier already exists.
    #[error("duplicate registry configuration identifier: {0}")]
    DuplicateConfig(RegistryConfigId),

    /// The configuration was not found.
    #[error("registry configuration not found: {0}")]
    NotFound(RegistryConfigId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl RegistryConfigRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
