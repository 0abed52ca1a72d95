//! Registry configuration services.

mod admin;
mod resolver;

pub use admin::{
    CreateRegistryConfigRequest, RegistryConfigError, RegistryConfigResult, RegistryConfigService,
    UpdateRegistryConfigRequest,
};
pub use resolver::{CredentialError, CredentialResolver, Destination, DestinationRequest};
