//! The uber page: global root of a resource.

use bytes::{Buf, BufMut};

use strata_common::{Revision, StoreError, StoreResult};

use crate::reference::PageReference;

/// Topmost page of a resource.
///
/// The uber page is the only page found via the root beacon rather than via
/// a reference. It anchors the revision tree, counts committed revisions,
/// and chains to its predecessor so the entire commit history stays
/// reachable from the newest root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UberPage {
    revision_count: u64,
    page_count: u64,
    tree_ref: PageReference,
    previous_ref: PageReference,
}

impl UberPage {
    /// Creates the uber page of a freshly bootstrapped resource, covering
    /// the single empty revision zero.
    #[must_use]
    pub fn bootstrap() -> Self {
        Self {
            revision_count: 1,
            page_count: 0,
            tree_ref: PageReference::Unresolved,
            previous_ref: PageReference::Unresolved,
        }
    }

    /// Clones this page to head the next revision.
    ///
    /// `previous` locates the currently stored uber page, preserving the
    /// history chain.
    #[must_use]
    pub fn clone_for_commit(&self, previous: PageReference) -> Self {
        Self {
            revision_count: self.revision_count + 1,
            page_count: self.page_count,
            tree_ref: self.tree_ref,
            previous_ref: previous,
        }
    }

    /// Number of committed revisions, the bootstrap revision included.
    #[must_use]
    pub fn revision_count(&self) -> u64 {
        self.revision_count
    }

    /// Newest committed revision.
    #[must_use]
    pub fn newest_revision(&self) -> Revision {
        Revision::new(self.revision_count - 1)
    }

    /// Total pages written to the resource across all commits.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// Adds `pages` to the resource-wide page tally.
    pub fn add_pages_written(&mut self, pages: u64) {
        self.page_count += pages;
    }

    /// Root reference of the revision tree.
    #[must_use]
    pub fn tree_ref(&self) -> &PageReference {
        &self.tree_ref
    }

    /// Replaces the revision tree root reference.
    pub fn set_tree_ref(&mut self, reference: PageReference) {
        self.tree_ref = reference;
    }

    /// Reference to the previously stored uber page, unresolved for the
    /// bootstrap page.
    #[must_use]
    pub fn previous_ref(&self) -> &PageReference {
        &self.previous_ref
    }

    /// Writes the page to `buf`.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.revision_count);
        buf.put_u64(self.page_count);
        buf.put_u16(2);
        self.tree_ref.serialize(buf);
        self.previous_ref.serialize(buf);
    }

    /// Reads a page from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        if buf.remaining() < 18 {
            return Err(StoreError::decode("truncated uber page"));
        }
        let revision_count = buf.get_u64();
        if revision_count == 0 {
            return Err(StoreError::decode("uber page with zero revisions"));
        }
        let page_count = buf.get_u64();
        let refs = buf.get_u16();
        if refs != 2 {
            return Err(StoreError::decode(format!(
                "uber page carries {refs} references, expected 2"
            )));
        }
        Ok(Self {
            revision_count,
            page_count,
            tree_ref: PageReference::deserialize(buf)?,
            previous_ref: PageReference::deserialize(buf)?,
        })
    }
}
