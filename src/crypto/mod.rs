//! AES-256-GCM sealing for container entries.
//!
//! One random 256-bit key is generated per container and shared by every
//! entry; each entry gets its own random nonce.  The key is handed to the
//! caller as hex and never written into the container.
//!
//! Encrypted payload layout: [ nonce (12 B) | ciphertext | GCM tag (16 B) ]

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use rand::{CryptoRng, RngCore};
use thiserror::Error;

/// Byte length of the container key.
pub const KEY_LEN: usize = 32;

/// Byte length of the AES-GCM nonce prepended to every encrypted payload.
pub const NONCE_LEN: usize = 12;

/// Byte length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Cipher construction failed")]
    CipherInit,
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,
    #[error("Encrypted payload too short (minimum {} bytes)", NONCE_LEN + TAG_LEN)]
    TooShort,
}

// ── ContainerKey ─────────────────────────────────────────────────────────────

/// The per-container AES-256 key.
#[derive(Clone, PartialEq, Eq)]
pub struct ContainerKey([u8; KEY_LEN]);

impl ContainerKey {
    /// Draw a fresh key from `rng`.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut key = [0u8; KEY_LEN];
        rng.fill_bytes(&mut key);
        Self(key)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("not valid hex: {e}")))?;
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "expected {} hex characters, got {}",
                KEY_LEN * 2,
                s.trim().len()
            ))
        })?;
        Ok(Self(key))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl From<[u8; KEY_LEN]> for ContainerKey {
    fn from(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

// Key material stays out of logs and panic messages.
impl fmt::Debug for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContainerKey(..)")
    }
}

// ── EntryCipher ──────────────────────────────────────────────────────────────

/// An AES-256-GCM instance bound to one container key.
pub struct EntryCipher {
    cipher: Aes256Gcm,
}

impl EntryCipher {
    pub fn new(key: &ContainerKey) -> Result<Self, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| CryptoError::CipherInit)?;
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` under a nonce drawn from `rng`.
    ///
    /// Returns `nonce (12 B) || ciphertext || GCM-tag (16 B)`.
    pub fn seal<R: RngCore + CryptoRng>(
        &self,
        plaintext: &[u8],
        rng:       &mut R,
    ) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a payload produced by [`EntryCipher::seal`].
    pub fn open(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::TooShort);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}
