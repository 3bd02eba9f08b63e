//! Indirect pages: fixed fan-out reference arrays.

use bytes::{Buf, BufMut};

use strata_common::constants::FANOUT;
use strata_common::{StoreError, StoreResult};

use crate::reference::PageReference;

/// An inner tree page holding [`FANOUT`] child references.
///
/// The same shape serves both trees of a resource: the data tree descending
/// to leaf pages and the revision tree descending to revision roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectPage {
    references: Vec<PageReference>,
}

impl IndirectPage {
    /// Creates a page with every child unresolved.
    #[must_use]
    pub fn new() -> Self {
        Self {
            references: vec![PageReference::Unresolved; FANOUT],
        }
    }

    /// Child reference at `offset`.
    #[must_use]
    pub fn reference(&self, offset: usize) -> &PageReference {
        &self.references[offset]
    }

    /// Replaces the child reference at `offset`.
    pub fn set_reference(&mut self, offset: usize, reference: PageReference) {
        self.references[offset] = reference;
    }

    /// Writes the page to `buf`.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.references.len() as u16);
        for reference in &self.references {
            reference.serialize(buf);
        }
    }

    /// Reads a page from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        if buf.remaining() < 2 {
            return Err(StoreError::decode("truncated indirect page header"));
        }
        let count = buf.get_u16() as usize;
        if count != FANOUT {
            return Err(StoreError::decode(format!(
                "indirect page fan-out {count}, expected {FANOUT}"
            )));
        }
        let mut references = Vec::with_capacity(count);
        for _ in 0..count {
            references.push(PageReference::deserialize(buf)?);
        }
        Ok(Self { references })
    }
}

impl Default for IndirectPage {
    fn default() -> Self {
        Self::new()
    }
}
