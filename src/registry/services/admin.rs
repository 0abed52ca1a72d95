//! Administrative operations on stored registry configurations.

use crate::registry::{
    domain::{RegistryConfig, RegistryConfigDomainError, RegistryConfigId, RegistryConfigView},
    ports::{CipherError, PasswordCipher, RegistryConfigRepository, RegistryConfigRepositoryError},
};
use mockable::Clock;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Request payload for creating a stored configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct CreateRegistryConfigRequest {
    name: String,
    registry_url: String,
    username: String,
    password: String,
    is_default: bool,
}

impl CreateRegistryConfigRequest {
    /// Creates a request with the required fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        registry_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            registry_url: registry_url.into(),
            username: username.into(),
            password: password.into(),
            is_default: false,
        }
    }

    /// Marks the new configuration as the default.
    #[must_use]
    pub const fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

impl fmt::Debug for CreateRegistryConfigRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateRegistryConfigRequest")
            .field("name", &self.name)
            .field("registry_url", &self.registry_url)
            .field("username", &self.username)
            .field("is_default", &self.is_default)
            .finish_non_exhaustive()
    }
}

/// Request payload for editing a stored configuration.
///
/// An absent or empty password keeps the stored ciphertext.
#[derive(Clone, PartialEq, Eq)]
pub struct UpdateRegistryConfigRequest {
    name: String,
    registry_url: String,
    username: String,
    password: Option<String>,
    is_default: bool,
}

impl UpdateRegistryConfigRequest {
    /// Creates a request that keeps the stored password.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        registry_url: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            registry_url: registry_url.into(),
            username: username.into(),
            password: None,
            is_default: false,
        }
    }

    /// Replaces the stored password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the default flag.
    #[must_use]
    pub const fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

impl fmt::Debug for UpdateRegistryConfigRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRegistryConfigRequest")
            .field("name", &self.name)
            .field("registry_url", &self.registry_url)
            .field("username", &self.username)
            .field("replaces_password", &self.password.is_some())
            .field("is_default", &self.is_default)
            .finish()
    }
}

/// Service-level errors for registry configuration administration.
#[derive(Debug, Error)]
pub enum RegistryConfigError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] RegistryConfigDomainError),

    /// A new configuration was submitted without a password.
    #[error("registry password must not be empty")]
    MissingPassword,

    /// The configuration does not exist.
    #[error("registry configuration not found: {0}")]
    NotFound(RegistryConfigId),

    /// Encrypting the password failed.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] RegistryConfigRepositoryError),
}

/// Result type for registry configuration administration.
pub type RegistryConfigResult<T> = Result<T, RegistryConfigError>;

/// Create, edit, list, and delete stored registry configurations.
#[derive(Clone)]
pub struct RegistryConfigService<R, P, C>
where
    R: RegistryConfigRepository,
    P: PasswordCipher,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    cipher: Arc<P>,
    clock: Arc<C>,
}

impl<R, P, C> RegistryConfigService<R, P, C>
where
    R: RegistryConfigRepository,
    P: PasswordCipher,
    C: Clock + Send + Sync,
{
    /// Creates a new administration service.
    #[must_use]
    pub const fn new(repository: Arc<R>, cipher: Arc<P>, clock: Arc<C>) -> Self {
        Self {
            repository,
            cipher,
            clock,
        }
    }

    /// Encrypts the password and stores a new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigError`] when validation or encryption fails or
    /// the repository rejects the write.
    pub async fn create(
        &self,
        request: CreateRegistryConfigRequest,
    ) -> RegistryConfigResult<RegistryConfigView> {
        if request.password.is_empty() {
            return Err(RegistryConfigError::MissingPassword);
        }
        let ciphertext = self.cipher.encrypt(&request.password)?;
        let mut config = RegistryConfig::new(
            &request.name,
            &request.registry_url,
            &request.username,
            ciphertext,
            &*self.clock,
        )?;
        config.set_default(request.is_default);
        self.repository.store(&config).await?;
        info!(config_id = %config.id(), name = config.name(), "registry configuration created");
        Ok(config.view())
    }

    /// Edits an existing configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigError::NotFound`] for an unknown identifier,
    /// or the validation, encryption, or repository failure.
    pub async fn update(
        &self,
        id: RegistryConfigId,
        request: UpdateRegistryConfigRequest,
    ) -> RegistryConfigResult<RegistryConfigView> {
        let mut config = self.load(id).await?;
        config.update_details(&request.name, &request.registry_url, &request.username)?;
        if let Some(password) = request.password.filter(|password| !password.is_empty()) {
            config.replace_password(self.cipher.encrypt(&password)?);
        }
        config.set_default(request.is_default);
        self.repository
            .update(&config)
            .await
            .map_err(|err| not_found_or(id, err))?;
        info!(config_id = %id, "registry configuration updated");
        Ok(config.view())
    }

    /// Deletes a configuration.
    ///
    /// Tasks that referenced it keep their recorded host and username.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigError::NotFound`] for an unknown identifier.
    pub async fn delete(&self, id: RegistryConfigId) -> RegistryConfigResult<()> {
        self.repository
            .delete(id)
            .await
            .map_err(|err| not_found_or(id, err))?;
        info!(config_id = %id, "registry configuration deleted");
        Ok(())
    }

    /// Returns every configuration, default first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigError::Repository`] when the lookup fails.
    pub async fn list(&self) -> RegistryConfigResult<Vec<RegistryConfigView>> {
        let configs = self.repository.list().await?;
        Ok(configs.iter().map(RegistryConfig::view).collect())
    }

    /// Returns one configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigError::NotFound`] for an unknown identifier.
    pub async fn get(&self, id: RegistryConfigId) -> RegistryConfigResult<RegistryConfigView> {
        Ok(self.load(id).await?.view())
    }

    /// Returns the default configuration, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigError::Repository`] when the lookup fails.
    pub async fn default_config(&self) -> RegistryConfigResult<Option<RegistryConfigView>> {
        let config = self.repository.find_default().await?;
        Ok(config.as_ref().map(RegistryConfig::view))
    }

    /// Records the outcome of an externally performed connectivity test.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigError::NotFound`] for an unknown identifier.
    pub async fn record_test_result(
        &self,
        id: RegistryConfigId,
        succeeded: bool,
    ) -> RegistryConfigResult<RegistryConfigView> {
        let mut config = self.load(id).await?;
        config.record_test(succeeded, &*self.clock);
        self.repository
            .update(&config)
            .await
            .map_err(|err| not_found_or(id, err))?;
        info!(config_id = %id, status = config.status().as_str(), "registry test recorded");
        Ok(config.view())
    }

    async fn load(&self, id: RegistryConfigId) -> RegistryConfigResult<RegistryConfig> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(RegistryConfigError::NotFound(id))
    }
}

fn not_found_or(id: RegistryConfigId, err: RegistryConfigRepositoryError) -> RegistryConfigError {
    match err {
        RegistryConfigRepositoryError::NotFound(_) => RegistryConfigError::NotFound(id),
        other => RegistryConfigError::Repository(other),
    }
}
