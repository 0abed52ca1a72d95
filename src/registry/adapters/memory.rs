//! In-memory registry configuration repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::registry::{
    domain::{RegistryConfig, RegistryConfigId},
    ports::{
        RegistryConfigRepository, RegistryConfigRepositoryError, RegistryConfigRepositoryResult,
    },
};

/// Thread-safe in-memory registry configuration repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistryConfigRepository {
    configs: Arc<RwLock<HashMap<RegistryConfigId, RegistryConfig>>>,
}

impl InMemoryRegistryConfigRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl ToString) -> RegistryConfigRepositoryError {
    RegistryConfigRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

fn clear_other_defaults(configs: &mut HashMap<RegistryConfigId, RegistryConfig>, keep: &RegistryConfig) {
    if keep.is_default() {
        for other in configs.values_mut().filter(|other| other.id() != keep.id()) {
            other.set_default(false);
        }
    }
}

#[async_trait]
impl RegistryConfigRepository for InMemoryRegistryConfigRepository {
    async fn store(&self, config: &RegistryConfig) -> RegistryConfigRepositoryResult<()> {
        let mut configs = self.configs.write().map_err(lock_error)?;
        if configs.contains_key(&config.id()) {
            return Err(RegistryConfigRepositoryError::DuplicateConfig(config.id()));
        }
        clear_other_defaults(&mut configs, config);
        configs.insert(config.id(), config.clone());
        Ok(())
    }

    async fn update(&self, config: &RegistryConfig) -> RegistryConfigRepositoryResult<()> {
        let mut configs = self.configs.write().map_err(lock_error)?;
        if !configs.contains_key(&config.id()) {
            return Err(RegistryConfigRepositoryError::NotFound(config.id()));
        }
        clear_other_defaults(&mut configs, config);
        configs.insert(config.id(), config.clone());
        Ok(())
    }

    async fn delete(&self, id: RegistryConfigId) -> RegistryConfigRepositoryResult<()> {
        let mut configs = self.configs.write().map_err(lock_error)?;
        configs
            .remove(&id)
            .map(|_| ())
            .ok_or(RegistryConfigRepositoryError::NotFound(id))
    }

    async fn find_by_id(
        &self,
        id: RegistryConfigId,
    ) -> RegistryConfigRepositoryResult<Option<RegistryConfig>> {
        let configs = self.configs.read().map_err(lock_error)?;
        Ok(configs.get(&id).cloned())
    }

    async fn list(&self) -> RegistryConfigRepositoryResult<Vec<RegistryConfig>> {
        let configs = self.configs.read().map_err(lock_error)?;
        let mut listed: Vec<RegistryConfig> = configs.values().cloned().collect();
        listed.sort_by(|a, b| {
            b.is_default()
                .cmp(&a.is_default())
                .then_with(|| b.created_at().cmp(&a.created_at()))
        });
        Ok(listed)
    }

    async fn find_default(&self) -> RegistryConfigRepositoryResult<Option<RegistryConfig>> {
        let configs = self.configs.read().map_err(lock_error)?;
        Ok(configs.values().find(|config| config.is_default()).cloned())
    }
}
