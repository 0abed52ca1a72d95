//! Destination registry configurations and credential resolution.
//!
//! Stored configurations carry an encrypted password; the
//! [`services::CredentialResolver`] turns either a stored configuration or
//! inline request fields into plain [`crate::transfer::domain::RegistryCredentials`]
//! when a transfer starts. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
