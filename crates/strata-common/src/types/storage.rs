//! Locators and integrity digests for persisted pages.

use std::fmt;

use bytes::{Buf, BufMut};
use xxhash_rust::xxh3::xxh3_128;

use crate::error::{StoreError, StoreResult};

/// Location of one encoded page inside a backend store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageKey {
    /// Byte offset of the first encoded byte.
    pub offset: u64,
    /// Length of the encoded page in bytes.
    pub length: u32,
}

impl StorageKey {
    /// Encoded size of a storage key on the wire.
    pub const SIZE: usize = 12;

    /// The null locator, marking references that were never persisted.
    pub const NULL: StorageKey = StorageKey {
        offset: 0,
        length: 0,
    };

    /// Creates a locator from an offset and a length.
    #[must_use]
    pub const fn new(offset: u64, length: u32) -> Self {
        Self { offset, length }
    }

    /// Whether this is the null locator.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.offset == 0 && self.length == 0
    }

    /// Writes the locator to `buf`.
    pub fn serialize(self, buf: &mut impl BufMut) {
        buf.put_u64(self.offset);
        buf.put_u32(self.length);
    }

    /// Reads a locator from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(StoreError::decode("truncated storage key"));
        }
        Ok(Self {
            offset: buf.get_u64(),
            length: buf.get_u32(),
        })
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.offset, self.length)
    }
}

/// 128-bit content digest of an encoded page.
///
/// Computed with XXH3-128 over the fully encoded payload, after compression
/// and encryption have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; 16]);

impl Checksum {
    /// Encoded size of a checksum on the wire.
    pub const SIZE: usize = 16;

    /// The all-zero digest, paired with [`StorageKey::NULL`].
    pub const ZERO: Checksum = Checksum([0; 16]);

    /// Digests `data`.
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(xxh3_128(data).to_be_bytes())
    }

    /// Creates a checksum from its raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw bytes of the digest.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Writes the digest to `buf`.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.0);
    }

    /// Reads a digest from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(StoreError::decode("truncated checksum"));
        }
        let mut bytes = [0u8; 16];
        buf.copy_to_slice(&mut bytes);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
