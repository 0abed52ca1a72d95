//! Port contracts for registry configuration storage and password sealing.

pub mod cipher;
pub mod repository;

pub use cipher::{CipherError, PasswordCipher};
pub use repository::{
    RegistryConfigRepository, RegistryConfigRepositoryError, RegistryConfigRepositoryResult,
};
