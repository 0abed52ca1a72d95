//! Domain model for stored registry configurations.

mod config;
mod error;
mod ids;

pub use config::{
    PersistedRegistryConfig, RegistryConfig, RegistryConfigView, VerificationStatus,
};
pub use error::{ParseVerificationStatusError, RegistryConfigDomainError};
pub use ids::RegistryConfigId;
