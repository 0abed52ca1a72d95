//! Adapter implementations for registry configuration ports.

pub mod cipher;
pub mod memory;
pub mod postgres;

pub use cipher::AesGcmPasswordCipher;
pub use memory::InMemoryRegistryConfigRepository;
