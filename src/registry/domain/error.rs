//! Error types for registry configuration validation.

use thiserror::Error;

/// Errors returned while constructing or editing a registry configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryConfigDomainError {
    /// The display name is empty after trimming.
    #[error("registry configuration name must not be empty")]
    EmptyName,

    /// The registry URL is empty after stripping scheme and slashes.
    #[error("registry URL must not be empty")]
    EmptyRegistryUrl,

    /// The username is empty after trimming.
    #[error("registry username must not be empty")]
    EmptyUsername,
}

/// Error returned while parsing a verification status from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown verification status: {0}")]
pub struct ParseVerificationStatusError(pub String);
