//! AES-256-GCM page sealing.
//!
//! Sealed pages carry a small envelope header that is also bound into the
//! ciphertext as associated data, so header tampering fails authentication:
//!
//! ```text
//! +-------+---------+-----+--------+-------+----------------+
//! | magic | version | alg | key id | nonce |   ciphertext   |
//! |  4 B  |   1 B   | 1 B |  4 B   | 12 B  |    variable    |
//! +-------+---------+-----+--------+-------+----------------+
//! ```
//!
//! A fresh random nonce is drawn for every page write, so rewriting the
//! same page never reuses a nonce under the same key.

use std::fmt;

use aes_gcm::aead::{Aead, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use zeroize::Zeroize;

use strata_common::{StoreError, StoreResult};

use crate::transform::Transform;

/// Byte length of an encryption key.
pub const KEY_SIZE: usize = 32;

const ENVELOPE_MAGIC: &[u8; 4] = b"STRE";
const ENVELOPE_VERSION: u8 = 1;
const ALG_AES256_GCM: u8 = 1;
const NONCE_SIZE: usize = 12;
const HEADER_SIZE: usize = 4 + 1 + 1 + 4 + NONCE_SIZE;

/// A 256-bit page encryption key.
///
/// Key material is wiped from memory on drop and never reaches the store;
/// only the configured key identifier is persisted.
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Wraps existing key material.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Draws a fresh random key from the operating system.
    #[must_use]
    pub fn generate() -> Self {
        use aes_gcm::aead::rand_core::RngCore;

        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    fn as_key(&self) -> &Key<Aes256Gcm> {
        Key::<Aes256Gcm>::from_slice(&self.bytes)
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// AES-256-GCM transform bound to one key.
pub struct AesGcmEncryption {
    key_id: u32,
    cipher: Aes256Gcm,
}

impl AesGcmEncryption {
    /// Creates the transform for `key_id` with the supplied key material.
    #[must_use]
    pub fn new(key_id: u32, key: &EncryptionKey) -> Self {
        Self {
            key_id,
            cipher: Aes256Gcm::new(key.as_key()),
        }
    }

    fn header(&self, nonce: &[u8]) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(ENVELOPE_MAGIC);
        header[4] = ENVELOPE_VERSION;
        header[5] = ALG_AES256_GCM;
        header[6..10].copy_from_slice(&self.key_id.to_be_bytes());
        header[10..].copy_from_slice(nonce);
        header
    }
}

impl fmt::Debug for AesGcmEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEncryption")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl Transform for AesGcmEncryption {
    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }

    fn encode(&self, input: &[u8]) -> StoreResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let header = self.header(nonce.as_slice());
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: input,
                    aad: &header,
                },
            )
            .map_err(|_| StoreError::pipeline("aes-gcm encrypt failed"))?;

        let mut out = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decode(&self, input: &[u8]) -> StoreResult<Vec<u8>> {
        if input.len() < HEADER_SIZE {
            return Err(StoreError::pipeline("sealed page shorter than envelope header"));
        }
        let (header, ciphertext) = input.split_at(HEADER_SIZE);
        if &header[..4] != ENVELOPE_MAGIC {
            return Err(StoreError::pipeline("bad envelope magic"));
        }
        if header[4] != ENVELOPE_VERSION {
            return Err(StoreError::pipeline(format!(
                "unsupported envelope version {}",
                header[4]
            )));
        }
        if header[5] != ALG_AES256_GCM {
            return Err(StoreError::pipeline(format!("unsupported cipher {}", header[5])));
        }
        let key_id = u32::from_be_bytes([header[6], header[7], header[8], header[9]]);
        if key_id != self.key_id {
            return Err(StoreError::pipeline(format!(
                "page sealed with key {key_id}, session holds key {}",
                self.key_id
            )));
        }
        let nonce = Nonce::from_slice(&header[10..HEADER_SIZE]);
        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            )
            .map_err(|_| StoreError::pipeline("aes-gcm authentication failed"))
    }
}
