//! Reversible password encryption capability.

use thiserror::Error;

/// Encrypts registry passwords for storage and decrypts them for use.
pub trait PasswordCipher: Send + Sync {
    /// Encrypts `plaintext` into a storable text blob.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encryption`] when the primitive fails.
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;

    /// Decrypts a blob produced by [`PasswordCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Decryption`] when the blob is malformed, was
    /// sealed under another key, or does not decode to UTF-8.
    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError>;
}

/// Errors returned by [`PasswordCipher`] implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Sealing the plaintext failed.
    #[error("password encryption failed")]
    Encryption,

    /// Opening the ciphertext failed.
    #[error("password decryption failed: {0}")]
    Decryption(&'static str),
}
