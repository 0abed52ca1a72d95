//! AES-256-GCM password cipher keyed from a shared secret.
//!
//! Blobs are `base64(nonce || ciphertext || tag)` with a fresh 96-bit nonce
//! per encryption. The key is the SHA-256 digest of the configured secret.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::registry::ports::{CipherError, PasswordCipher};

const NONCE_LEN: usize = 12;

/// [`PasswordCipher`] backed by AES-256-GCM.
#[derive(Clone)]
pub struct AesGcmPasswordCipher {
    cipher: Aes256Gcm,
}

impl AesGcmPasswordCipher {
    /// Derives the key from `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }
}

impl fmt::Debug for AesGcmPasswordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmPasswordCipher").finish_non_exhaustive()
    }
}

impl PasswordCipher for AesGcmPasswordCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(STANDARD.encode(blob))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let blob = STANDARD
            .decode(ciphertext.trim())
            .map_err(|_| CipherError::Decryption("invalid base64"))?;
        let (nonce, sealed) = blob
            .split_at_checked(NONCE_LEN)
            .ok_or(CipherError::Decryption("ciphertext too short"))?;
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CipherError::Decryption("authentication failed"))?;
        String::from_utf8(plaintext).map_err(|_| CipherError::Decryption("not valid UTF-8"))
    }
}
