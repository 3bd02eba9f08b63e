//! References from pages to pages.

use std::fmt;

use bytes::{Buf, BufMut};

use strata_common::{Checksum, LogKey, StorageKey, StoreError, StoreResult};

/// A child pointer inside a page.
///
/// References move through three states over a page's life: `Unresolved`
/// until the child exists, `InMemory` while the child sits dirty in a write
/// transaction log, and `Persisted` once the child has been flushed. All
/// three states round-trip on the wire: the log spills whole containers to
/// disk under memory pressure, so a serialized indirect page may carry
/// `InMemory` children mid-transaction. Commit patches every `InMemory`
/// reference to `Persisted` before a page reaches the store itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageReference {
    /// No child exists at this position yet.
    Unresolved,
    /// The child is dirty and lives in the write transaction log.
    InMemory(LogKey),
    /// The child is stored.
    Persisted {
        /// Location of the encoded child.
        key: StorageKey,
        /// Digest of the encoded child bytes.
        checksum: Checksum,
    },
}

const TAG_UNRESOLVED: u8 = 0;
const TAG_IN_MEMORY: u8 = 1;
const TAG_PERSISTED: u8 = 2;

impl PageReference {
    /// Creates a persisted reference.
    #[must_use]
    pub const fn persisted(key: StorageKey, checksum: Checksum) -> Self {
        Self::Persisted { key, checksum }
    }

    /// Whether the referenced child still sits in a transaction log.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        matches!(self, Self::InMemory(_))
    }

    /// Whether no child exists at this position.
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved)
    }

    /// Location and digest of the child, when persisted.
    #[must_use]
    pub const fn as_persisted(&self) -> Option<(StorageKey, Checksum)> {
        match self {
            Self::Persisted { key, checksum } => Some((*key, *checksum)),
            _ => None,
        }
    }

    /// Log key of the dirty child, when in memory.
    #[must_use]
    pub const fn as_log_key(&self) -> Option<LogKey> {
        match self {
            Self::InMemory(key) => Some(*key),
            _ => None,
        }
    }

    /// Writes the reference to `buf`.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        match self {
            Self::Unresolved => buf.put_u8(TAG_UNRESOLVED),
            Self::InMemory(key) => {
                buf.put_u8(TAG_IN_MEMORY);
                key.serialize(buf);
            }
            Self::Persisted { key, checksum } => {
                buf.put_u8(TAG_PERSISTED);
                key.serialize(buf);
                checksum.serialize(buf);
            }
        }
    }

    /// Reads a reference from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        if buf.remaining() < 1 {
            return Err(StoreError::decode("truncated page reference"));
        }
        match buf.get_u8() {
            TAG_UNRESOLVED => Ok(Self::Unresolved),
            TAG_IN_MEMORY => Ok(Self::InMemory(LogKey::deserialize(buf)?)),
            TAG_PERSISTED => {
                let key = StorageKey::deserialize(buf)?;
                let checksum = Checksum::deserialize(buf)?;
                Ok(Self::Persisted { key, checksum })
            }
            tag => Err(StoreError::decode(format!("unknown page reference tag {tag}"))),
        }
    }
}

impl fmt::Display for PageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved => f.write_str("unresolved"),
            Self::InMemory(key) => write!(f, "memory({key})"),
            Self::Persisted { key, .. } => write!(f, "stored({key})"),
        }
    }
}
