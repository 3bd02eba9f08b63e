//! Keys addressing in-flight pages inside a write transaction log.

use std::fmt;

use bytes::{Buf, BufMut};

use crate::constants::INDIRECT_LEVEL_COUNT;
use crate::error::{StoreError, StoreResult};
use crate::types::PageKey;

/// Position of a dirty page within the write transaction log.
///
/// `level` counts from the root of the data tree: values below
/// [`LogKey::LEAF_LEVEL`] address indirect pages, `LEAF_LEVEL` itself
/// addresses leaf containers. `seq` is the level-local sequence number of
/// the page, so the pair pins a unique node of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogKey {
    level: u8,
    seq: u64,
}

impl LogKey {
    /// Log level of leaf containers, one past the deepest indirect level.
    pub const LEAF_LEVEL: u8 = INDIRECT_LEVEL_COUNT as u8;

    /// Encoded size of a log key on the wire.
    pub const SIZE: usize = 9;

    /// Key of the leaf container for `page_key`.
    #[must_use]
    pub const fn leaf(page_key: PageKey) -> Self {
        Self {
            level: Self::LEAF_LEVEL,
            seq: page_key.as_u64(),
        }
    }

    /// Key of the indirect page at `level` with sequence number `seq`.
    #[must_use]
    pub fn indirect(level: usize, seq: u64) -> Self {
        debug_assert!(level < INDIRECT_LEVEL_COUNT);
        Self {
            level: level as u8,
            seq,
        }
    }

    /// Log level of the page.
    #[must_use]
    pub const fn level(self) -> u8 {
        self.level
    }

    /// Level-local sequence number of the page.
    #[must_use]
    pub const fn seq(self) -> u64 {
        self.seq
    }

    /// Whether this key addresses a leaf container.
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        self.level == Self::LEAF_LEVEL
    }

    /// Writes the key to `buf`.
    pub fn serialize(self, buf: &mut impl BufMut) {
        buf.put_u8(self.level);
        buf.put_u64(self.seq);
    }

    /// Reads a key from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(StoreError::decode("truncated log key"));
        }
        let level = buf.get_u8();
        if level > Self::LEAF_LEVEL {
            return Err(StoreError::decode(format!("log key level {level} out of range")));
        }
        Ok(Self {
            level,
            seq: buf.get_u64(),
        })
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            write!(f, "leaf:{}", self.seq)
        } else {
            write!(f, "indirect[{}]:{}", self.level, self.seq)
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn leaf_and_indirect_keys_are_distinct() {
        let leaf = LogKey::leaf(PageKey::new(7));
        let indirect = LogKey::indirect(4, 7);
        assert_ne!(leaf, indirect);
        assert!(leaf.is_leaf());
        assert!(!indirect.is_leaf());
    }

    #[test]
    fn round_trip() {
        let key = LogKey::indirect(2, 0x0102_0304);
        let mut buf = BytesMut::new();
        key.serialize(&mut buf);
        assert_eq!(buf.len(), LogKey::SIZE);

        let mut read = buf.freeze();
        assert_eq!(LogKey::deserialize(&mut read).unwrap(), key);
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(LogKey::LEAF_LEVEL + 1);
        buf.put_u64(0);

        let mut read = buf.freeze();
        assert!(LogKey::deserialize(&mut read).is_err());
    }

    #[test]
    fn display_names_the_tier() {
        assert_eq!(LogKey::leaf(PageKey::new(3)).to_string(), "leaf:3");
        assert_eq!(LogKey::indirect(1, 9).to_string(), "indirect[1]:9");
    }
}
