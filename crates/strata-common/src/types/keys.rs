//! Key newtypes for records, pages, and revisions.

use std::fmt;

use crate::constants::{
    FANOUT_EXPONENT, FANOUT_MASK, LEVEL_SHIFTS, MAX_RECORD_KEY, SLOTS_PER_LEAF_EXPONENT, SLOT_MASK,
};

/// Identifier of a single record within a resource.
///
/// A record key addresses both the leaf page holding the record and the slot
/// within that page: the low [`SLOTS_PER_LEAF_EXPONENT`] bits select the
/// slot, the remaining bits form the [`PageKey`] of the leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(u64);

impl RecordKey {
    /// Creates a record key from its numeric value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Numeric value of the key.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether the key lies inside the addressable record space.
    #[must_use]
    pub const fn is_addressable(self) -> bool {
        self.0 <= MAX_RECORD_KEY
    }

    /// Key of the leaf page holding this record.
    #[must_use]
    pub const fn page_key(self) -> PageKey {
        PageKey(self.0 >> SLOTS_PER_LEAF_EXPONENT)
    }

    /// Slot index of this record within its leaf page.
    #[must_use]
    pub const fn slot(self) -> usize {
        (self.0 & SLOT_MASK) as usize
    }
}

impl From<u64> for RecordKey {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a leaf page within a page tree.
///
/// Page keys double as paths through the indirect levels: at each level the
/// key yields the child offset to descend into and the level-local sequence
/// number of the indirect page traversed there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey(u64);

impl PageKey {
    /// Creates a page key from its numeric value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Numeric value of the key.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Sequence number of the indirect page traversed at `level` on the
    /// path to this leaf.
    #[must_use]
    pub const fn indirect_seq(self, level: usize) -> u64 {
        self.0 >> (LEVEL_SHIFTS[level] + FANOUT_EXPONENT)
    }

    /// Child offset taken at `level` on the path to this leaf.
    #[must_use]
    pub const fn indirect_offset(self, level: usize) -> usize {
        ((self.0 >> LEVEL_SHIFTS[level]) & FANOUT_MASK) as usize
    }
}

impl From<u64> for PageKey {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of a committed snapshot, starting at zero for the state created
/// together with the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Revision(u64);

impl Revision {
    /// The bootstrap revision present in every resource.
    pub const ZERO: Revision = Revision(0);

    /// Creates a revision number from its numeric value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Numeric value of the revision.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The revision following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<u64> for Revision {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{INDIRECT_LEVEL_COUNT, SLOTS_PER_LEAF};

    #[test]
    fn record_key_splits_into_page_and_slot() {
        let key = RecordKey::new(5);
        assert_eq!(key.page_key().as_u64(), 0);
        assert_eq!(key.slot(), 5);

        let key = RecordKey::new(SLOTS_PER_LEAF as u64 * 3 + 17);
        assert_eq!(key.page_key().as_u64(), 3);
        assert_eq!(key.slot(), 17);
    }

    #[test]
    fn addressable_bound() {
        assert!(RecordKey::new(MAX_RECORD_KEY).is_addressable());
        assert!(!RecordKey::new(MAX_RECORD_KEY + 1).is_addressable());
    }

    #[test]
    fn page_key_zero_descends_leftmost() {
        let key = PageKey::new(0);
        for level in 0..INDIRECT_LEVEL_COUNT {
            assert_eq!(key.indirect_offset(level), 0);
            assert_eq!(key.indirect_seq(level), 0);
        }
    }

    #[test]
    fn page_key_path_reassembles() {
        let key = PageKey::new(0x3_1234_5678);
        let mut reassembled = 0u64;
        for level in 0..INDIRECT_LEVEL_COUNT {
            reassembled = (reassembled << 7) | key.indirect_offset(level) as u64;
        }
        assert_eq!(reassembled, key.as_u64());
    }

    #[test]
    fn deepest_level_seq_matches_sibling_group() {
        let key = PageKey::new(129);
        assert_eq!(key.indirect_seq(INDIRECT_LEVEL_COUNT - 1), 1);
        assert_eq!(key.indirect_offset(INDIRECT_LEVEL_COUNT - 1), 1);
    }

    #[test]
    fn revision_ordering() {
        assert!(Revision::ZERO < Revision::new(1));
        assert_eq!(Revision::new(6).next().as_u64(), 7);
        assert_eq!(Revision::new(3).to_string(), "r3");
    }
}
