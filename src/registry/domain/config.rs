//! Registry configuration aggregate and its password-free view.

use super::{ParseVerificationStatusError, RegistryConfigDomainError, RegistryConfigId};
use crate::reference::normalize_registry_host;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Outcome of the most recent connectivity test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Never tested, or edited since the last test.
    Pending,
    /// The last test reached the registry with these credentials.
    Verified,
    /// The last test failed.
    Failed,
}

impl VerificationStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for VerificationStatus {
    type Error = ParseVerificationStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseVerificationStatusError(value.to_owned())),
        }
    }
}

/// A named, reusable set of destination registry credentials.
///
/// The password is only ever held as ciphertext produced by a
/// [`crate::registry::ports::PasswordCipher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    id: RegistryConfigId,
    name: String,
    registry_url: String,
    username: String,
    password_encrypted: String,
    status: VerificationStatus,
    last_tested_at: Option<DateTime<Utc>>,
    is_default: bool,
    created_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRegistryConfig {
    /// Persisted identifier.
    pub id: RegistryConfigId,
    /// Display name.
    pub name: String,
    /// Registry URL as entered.
    pub registry_url: String,
    /// Registry username.
    pub username: String,
    /// Encrypted password blob.
    pub password_encrypted: String,
    /// Verification status.
    pub status: VerificationStatus,
    /// Time of the last connectivity test.
    pub last_tested_at: Option<DateTime<Utc>>,
    /// Whether this is the default configuration.
    pub is_default: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl RegistryConfig {
    /// Creates a new, untested configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigDomainError`] when the name, URL, or username
    /// is blank.
    pub fn new(
        name: &str,
        registry_url: &str,
        username: &str,
        password_encrypted: String,
        clock: &impl Clock,
    ) -> Result<Self, RegistryConfigDomainError> {
        let (name, registry_url, username) = validate_details(name, registry_url, username)?;
        Ok(Self {
            id: RegistryConfigId::new(),
            name,
            registry_url,
            username,
            password_encrypted,
            status: VerificationStatus::Pending,
            last_tested_at: None,
            is_default: false,
            created_at: clock.utc(),
        })
    }

    /// Reconstructs a configuration from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedRegistryConfig) -> Self {
        Self {
            id: data.id,
            name: data.name,
            registry_url: data.registry_url,
            username: data.username,
            password_encrypted: data.password_encrypted,
            status: data.status,
            last_tested_at: data.last_tested_at,
            is_default: data.is_default,
            created_at: data.created_at,
        }
    }

    /// Returns the identifier.
    #[must_use]
    pub const fn id(&self) -> RegistryConfigId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the registry URL as entered.
    #[must_use]
    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// Returns the registry host: the URL without scheme or trailing slash.
    #[must_use]
    pub fn host(&self) -> &str {
        normalize_registry_host(&self.registry_url)
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the encrypted password blob.
    #[must_use]
    pub fn password_encrypted(&self) -> &str {
        &self.password_encrypted
    }

    /// Returns the verification status.
    #[must_use]
    pub const fn status(&self) -> VerificationStatus {
        self.status
    }

    /// Returns when the configuration was last tested.
    #[must_use]
    pub const fn last_tested_at(&self) -> Option<DateTime<Utc>> {
        self.last_tested_at
    }

    /// Returns `true` for the default configuration.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.is_default
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Replaces name, URL, and username, resetting verification.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryConfigDomainError`] when any field is blank; the
    /// configuration is left unchanged.
    pub fn update_details(
        &mut self,
        name: &str,
        registry_url: &str,
        username: &str,
    ) -> Result<(), RegistryConfigDomainError> {
        let (new_name, new_url, new_username) = validate_details(name, registry_url, username)?;
        self.name = new_name;
        self.registry_url = new_url;
        self.username = new_username;
        self.status = VerificationStatus::Pending;
        Ok(())
    }

    /// Replaces the stored ciphertext, resetting verification.
    pub fn replace_password(&mut self, password_encrypted: String) {
        self.password_encrypted = password_encrypted;
        self.status = VerificationStatus::Pending;
    }

    /// Records the outcome of a connectivity test.
    pub fn record_test(&mut self, succeeded: bool, clock: &impl Clock) {
        self.status = if succeeded {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Failed
        };
        self.last_tested_at = Some(clock.utc());
    }

    /// Sets the default flag on this value only.
    ///
    /// Repositories clear the flag on every other configuration when storing
    /// a default.
    pub const fn set_default(&mut self, is_default: bool) {
        self.is_default = is_default;
    }

    /// Returns a view without the password ciphertext.
    #[must_use]
    pub fn view(&self) -> RegistryConfigView {
        RegistryConfigView {
            id: self.id,
            name: self.name.clone(),
            registry_url: self.registry_url.clone(),
            username: self.username.clone(),
            has_password: !self.password_encrypted.is_empty(),
            status: self.status,
            last_tested_at: self.last_tested_at,
            is_default: self.is_default,
            created_at: self.created_at,
        }
    }
}

/// Password-free projection of a [`RegistryConfig`] for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfigView {
    /// Identifier.
    pub id: RegistryConfigId,
    /// Display name.
    pub name: String,
    /// Registry URL as entered.
    pub registry_url: String,
    /// Registry username.
    pub username: String,
    /// Whether a password is stored.
    pub has_password: bool,
    /// Verification status.
    pub status: VerificationStatus,
    /// Time of the last connectivity test.
    pub last_tested_at: Option<DateTime<Utc>>,
    /// Whether this is the default configuration.
    pub is_default: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

fn validate_details(
    name: &str,
    registry_url: &str,
    username: &str,
) -> Result<(String, String, String), RegistryConfigDomainError> {
    let trimmed_name = name.trim();
    if trimmed_name.is_empty() {
        return Err(RegistryConfigDomainError::EmptyName);
    }
    if normalize_registry_host(registry_url).is_empty() {
        return Err(RegistryConfigDomainError::EmptyRegistryUrl);
    }
    let trimmed_username = username.trim();
    if trimmed_username.is_empty() {
        return Err(RegistryConfigDomainError::EmptyUsername);
    }
    Ok((
        trimmed_name.to_owned(),
        registry_url.trim().to_owned(),
        trimmed_username.to_owned(),
    ))
}
