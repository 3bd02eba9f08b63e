//! Leaf pages: fixed arrays of record slots.

use bytes::{Buf, BufMut, Bytes};

use strata_common::constants::SLOTS_PER_LEAF;
use strata_common::{PageKey, Revision, StoreError, StoreResult};

const SLOT_EMPTY: u8 = 0;
const SLOT_VALUE: u8 = 1;
const SLOT_TOMBSTONE: u8 = 2;

/// Payload of one record slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSlot {
    /// A live record value.
    Value(Bytes),
    /// The record was removed; the marker shadows older values of the slot
    /// across page versions.
    Tombstone,
}

/// A leaf page holding up to [`SLOTS_PER_LEAF`] record slots.
///
/// Under the windowed revisioning strategies an instance may be sparse,
/// carrying only the slots its revision touched. The revisioning module
/// overlays instances, newest first, to reconstruct the full page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPage {
    page_key: PageKey,
    revision: Revision,
    slots: Vec<Option<RecordSlot>>,
}

impl LeafPage {
    /// Creates an empty leaf for `page_key`, tagged with the revision that
    /// materialized it.
    #[must_use]
    pub fn new(page_key: PageKey, revision: Revision) -> Self {
        Self {
            page_key,
            revision,
            slots: vec![None; SLOTS_PER_LEAF],
        }
    }

    /// Key of this leaf within the data tree.
    #[must_use]
    pub fn page_key(&self) -> PageKey {
        self.page_key
    }

    /// Revision that materialized this instance.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Re-tags the instance with `revision`.
    pub fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }

    /// Contents of `slot`, if populated.
    #[must_use]
    pub fn slot(&self, slot: usize) -> Option<&RecordSlot> {
        self.slots[slot].as_ref()
    }

    /// Whether `slot` is populated, by a value or a tombstone.
    #[must_use]
    pub fn is_populated(&self, slot: usize) -> bool {
        self.slots[slot].is_some()
    }

    /// Sets the contents of `slot`.
    pub fn set_slot(&mut self, slot: usize, value: RecordSlot) {
        self.slots[slot] = Some(value);
    }

    /// Copies every populated slot of `other` that is still empty here.
    pub fn fill_empty_from(&mut self, other: &LeafPage) {
        for (mine, theirs) in self.slots.iter_mut().zip(&other.slots) {
            if mine.is_none() {
                mine.clone_from(theirs);
            }
        }
    }

    /// Number of populated slots.
    #[must_use]
    pub fn populated_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Iterates over populated slots with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &RecordSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|slot| (i, slot)))
    }

    /// Writes the leaf to `buf`.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.page_key.as_u64());
        buf.put_u64(self.revision.as_u64());
        for slot in &self.slots {
            match slot {
                None => buf.put_u8(SLOT_EMPTY),
                Some(RecordSlot::Value(value)) => {
                    buf.put_u8(SLOT_VALUE);
                    buf.put_u32(value.len() as u32);
                    buf.put_slice(value);
                }
                Some(RecordSlot::Tombstone) => buf.put_u8(SLOT_TOMBSTONE),
            }
        }
    }

    /// Reads a leaf from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        if buf.remaining() < 16 {
            return Err(StoreError::decode("truncated leaf page header"));
        }
        let page_key = PageKey::new(buf.get_u64());
        let revision = Revision::new(buf.get_u64());

        let mut slots = vec![None; SLOTS_PER_LEAF];
        for (index, slot) in slots.iter_mut().enumerate() {
            if buf.remaining() < 1 {
                return Err(StoreError::decode(format!("leaf page cut off at slot {index}")));
            }
            match buf.get_u8() {
                SLOT_EMPTY => {}
                SLOT_VALUE => {
                    if buf.remaining() < 4 {
                        return Err(StoreError::decode("truncated record length"));
                    }
                    let len = buf.get_u32() as usize;
                    if buf.remaining() < len {
                        return Err(StoreError::decode(format!(
                            "record in slot {index} claims {len} bytes, buffer has {}",
                            buf.remaining()
                        )));
                    }
                    *slot = Some(RecordSlot::Value(buf.copy_to_bytes(len)));
                }
                SLOT_TOMBSTONE => *slot = Some(RecordSlot::Tombstone),
                tag => {
                    return Err(StoreError::decode(format!(
                        "unknown slot tag {tag} in slot {index}"
                    )))
                }
            }
        }

        Ok(Self {
            page_key,
            revision,
            slots,
        })
    }
}
