//! Destination registry credentials.

use std::fmt;

/// Resolved credentials for pushing to a destination registry.
///
/// The password is held in plain text only for the lifetime of a transfer
/// and is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    host: String,
    username: String,
    password: String,
}

impl RegistryCredentials {
    /// Creates a credential set.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the registry host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the plain-text password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
