//! Resolution of a request's destination into usable credentials.

use crate::reference::normalize_registry_host;
use crate::registry::{
    domain::RegistryConfigId,
    ports::{CipherError, PasswordCipher, RegistryConfigRepository, RegistryConfigRepositoryError},
};
use crate::transfer::domain::RegistryCredentials;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Where a transfer should push: a stored configuration or inline fields.
///
/// A stored configuration identifier takes precedence over inline fields.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DestinationRequest {
    /// Stored configuration to use.
    pub config_id: Option<RegistryConfigId>,
    /// Inline registry host or URL.
    pub host: String,
    /// Inline username.
    pub username: String,
    /// Inline plain-text password.
    pub password: String,
}

impl DestinationRequest {
    /// Targets a stored configuration.
    #[must_use]
    pub fn stored(config_id: RegistryConfigId) -> Self {
        Self {
            config_id: Some(config_id),
            ..Self::default()
        }
    }

    /// Targets a registry with inline credentials.
    #[must_use]
    pub fn inline(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            config_id: None,
            host: host.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for DestinationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationRequest")
            .field("config_id", &self.config_id)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Destination details that are safe to persist on a task record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Registry host without scheme.
    pub host: String,
    /// Username presented to the registry.
    pub username: String,
    /// Stored configuration the destination came from.
    pub config_id: Option<RegistryConfigId>,
}

/// Errors returned while resolving destination credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Neither a stored configuration nor a full inline set was supplied.
    #[error("a stored registry configuration or inline host, username, and password is required")]
    IncompleteConfiguration,

    /// The referenced stored configuration does not exist.
    #[error("registry configuration not found: {0}")]
    ConfigNotFound(RegistryConfigId),

    /// Looking up the stored configuration failed.
    #[error(transparent)]
    Repository(#[from] RegistryConfigRepositoryError),

    /// Decrypting the stored password failed.
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Turns a [`DestinationRequest`] into [`RegistryCredentials`].
#[derive(Clone)]
pub struct CredentialResolver<R, P>
where
    R: RegistryConfigRepository,
    P: PasswordCipher,
{
    repository: Arc<R>,
    cipher: Arc<P>,
}

impl<R, P> CredentialResolver<R, P>
where
    R: RegistryConfigRepository,
    P: PasswordCipher,
{
    /// Creates a resolver over a configuration store and cipher.
    #[must_use]
    pub const fn new(repository: Arc<R>, cipher: Arc<P>) -> Self {
        Self { repository, cipher }
    }

    /// Resolves host and username without touching the password.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::IncompleteConfiguration`] when inline fields
    /// are missing, [`CredentialError::ConfigNotFound`] for an unknown stored
    /// configuration, or the repository failure unchanged.
    pub async fn describe(&self, request: &DestinationRequest) -> Result<Destination, CredentialError> {
        if let Some(config_id) = request.config_id {
            let config = self
                .repository
                .find_by_id(config_id)
                .await?
                .ok_or(CredentialError::ConfigNotFound(config_id))?;
            return Ok(Destination {
                host: config.host().to_owned(),
                username: config.username().to_owned(),
                config_id: Some(config_id),
            });
        }

        let (host, username, _) = inline_fields(request)?;
        Ok(Destination {
            host: host.to_owned(),
            username: username.to_owned(),
            config_id: None,
        })
    }

    /// Resolves full credentials, decrypting a stored password if needed.
    ///
    /// # Errors
    ///
    /// As [`CredentialResolver::describe`], plus [`CredentialError::Cipher`]
    /// when the stored password cannot be decrypted. Nothing is retried.
    pub async fn resolve(
        &self,
        request: &DestinationRequest,
    ) -> Result<RegistryCredentials, CredentialError> {
        if let Some(config_id) = request.config_id {
            let config = self
                .repository
                .find_by_id(config_id)
                .await?
                .ok_or(CredentialError::ConfigNotFound(config_id))?;
            let password = self.cipher.decrypt(config.password_encrypted())?;
            return Ok(RegistryCredentials::new(
                config.host(),
                config.username(),
                password,
            ));
        }

        let (host, username, password) = inline_fields(request)?;
        Ok(RegistryCredentials::new(host, username, password))
    }
}

fn inline_fields(request: &DestinationRequest) -> Result<(&str, &str, &str), CredentialError> {
    let host = normalize_registry_host(&request.host);
    let username = request.username.trim();
    if host.is_empty() || username.is_empty() || request.password.is_empty() {
        return Err(CredentialError::IncompleteConfiguration);
    }
    Ok((host, username, &request.password))
}
