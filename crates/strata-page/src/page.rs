//! The page enum and its wire codec.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use strata_common::{StoreError, StoreResult};

use crate::indirect::IndirectPage;
use crate::leaf::LeafPage;
use crate::name::NamePage;
use crate::revision_root::RevisionRootPage;
use crate::uber::UberPage;

const KIND_LEAF: u8 = 1;
const KIND_INDIRECT: u8 = 2;
const KIND_REVISION_ROOT: u8 = 3;
const KIND_NAME: u8 = 4;
const KIND_UBER: u8 = 5;

/// Any page of a resource.
///
/// Every page travels the same path to the store: serialize with a leading
/// kind tag, run through the byte pipeline, checksum, append. This enum is
/// that common currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// Record-bearing leaf of the data tree.
    Leaf(LeafPage),
    /// Inner page of the data or revision tree.
    Indirect(IndirectPage),
    /// Root of one committed revision.
    RevisionRoot(RevisionRootPage),
    /// Name dictionary of one revision.
    Name(NamePage),
    /// Global root of the resource.
    Uber(UberPage),
}

impl Page {
    /// Wire tag of this page's kind.
    #[must_use]
    pub fn kind(&self) -> u8 {
        match self {
            Self::Leaf(_) => KIND_LEAF,
            Self::Indirect(_) => KIND_INDIRECT,
            Self::RevisionRoot(_) => KIND_REVISION_ROOT,
            Self::Name(_) => KIND_NAME,
            Self::Uber(_) => KIND_UBER,
        }
    }

    /// Human-readable kind name.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Leaf(_) => "leaf",
            Self::Indirect(_) => "indirect",
            Self::RevisionRoot(_) => "revision root",
            Self::Name(_) => "name",
            Self::Uber(_) => "uber",
        }
    }

    /// Writes the page to `buf`, kind tag first.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.kind());
        match self {
            Self::Leaf(page) => page.serialize(buf),
            Self::Indirect(page) => page.serialize(buf),
            Self::RevisionRoot(page) => page.serialize(buf),
            Self::Name(page) => page.serialize(buf),
            Self::Uber(page) => page.serialize(buf),
        }
    }

    /// Serializes into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.serialize(&mut buf);
        buf.freeze()
    }

    /// Reads a page from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        if buf.remaining() < 1 {
            return Err(StoreError::decode("empty page buffer"));
        }
        match buf.get_u8() {
            KIND_LEAF => Ok(Self::Leaf(LeafPage::deserialize(buf)?)),
            KIND_INDIRECT => Ok(Self::Indirect(IndirectPage::deserialize(buf)?)),
            KIND_REVISION_ROOT => Ok(Self::RevisionRoot(RevisionRootPage::deserialize(buf)?)),
            KIND_NAME => Ok(Self::Name(NamePage::deserialize(buf)?)),
            KIND_UBER => Ok(Self::Uber(UberPage::deserialize(buf)?)),
            kind => Err(StoreError::decode(format!("unknown page kind {kind}"))),
        }
    }

    /// Reads a page from a byte slice.
    pub fn from_bytes(mut bytes: &[u8]) -> StoreResult<Self> {
        Self::deserialize(&mut bytes)
    }

    /// Unwraps a leaf page.
    pub fn into_leaf(self) -> StoreResult<LeafPage> {
        match self {
            Self::Leaf(page) => Ok(page),
            other => Err(other.kind_mismatch("leaf")),
        }
    }

    /// Unwraps a revision root page.
    pub fn into_revision_root(self) -> StoreResult<RevisionRootPage> {
        match self {
            Self::RevisionRoot(page) => Ok(page),
            other => Err(other.kind_mismatch("revision root")),
        }
    }

    /// Unwraps a name dictionary page.
    pub fn into_name(self) -> StoreResult<NamePage> {
        match self {
            Self::Name(page) => Ok(page),
            other => Err(other.kind_mismatch("name")),
        }
    }

    /// Unwraps an uber page.
    pub fn into_uber(self) -> StoreResult<UberPage> {
        match self {
            Self::Uber(page) => Ok(page),
            other => Err(other.kind_mismatch("uber")),
        }
    }

    /// Borrows the page as a leaf.
    pub fn as_leaf(&self) -> StoreResult<&LeafPage> {
        match self {
            Self::Leaf(page) => Ok(page),
            other => Err(other.kind_mismatch("leaf")),
        }
    }

    /// Mutably borrows the page as a leaf.
    pub fn as_leaf_mut(&mut self) -> StoreResult<&mut LeafPage> {
        match self {
            Self::Leaf(page) => Ok(page),
            other => Err(other.kind_mismatch("leaf")),
        }
    }

    /// Borrows the page as an indirect page.
    pub fn as_indirect(&self) -> StoreResult<&IndirectPage> {
        match self {
            Self::Indirect(page) => Ok(page),
            other => Err(other.kind_mismatch("indirect")),
        }
    }

    /// Mutably borrows the page as an indirect page.
    pub fn as_indirect_mut(&mut self) -> StoreResult<&mut IndirectPage> {
        match self {
            Self::Indirect(page) => Ok(page),
            other => Err(other.kind_mismatch("indirect")),
        }
    }

    fn kind_mismatch(&self, expected: &str) -> StoreError {
        StoreError::corrupt(format!(
            "expected {expected} page, found {} page",
            self.kind_name()
        ))
    }
}

impl From<LeafPage> for Page {
    fn from(page: LeafPage) -> Self {
        Self::Leaf(page)
    }
}

impl From<IndirectPage> for Page {
    fn from(page: IndirectPage) -> Self {
        Self::Indirect(page)
    }
}

impl From<RevisionRootPage> for Page {
    fn from(page: RevisionRootPage) -> Self {
        Self::RevisionRoot(page)
    }
}

impl From<NamePage> for Page {
    fn from(page: NamePage) -> Self {
        Self::Name(page)
    }
}

impl From<UberPage> for Page {
    fn from(page: UberPage) -> Self {
        Self::Uber(page)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use strata_common::{PageKey, RecordKey, Revision};

    use super::*;
    use crate::leaf::RecordSlot;
    use crate::reference::PageReference;

    fn sample_pages() -> Vec<Page> {
        let mut leaf = LeafPage::new(PageKey::new(3), Revision::new(1));
        leaf.set_slot(5, RecordSlot::Value(Bytes::from_static(b"value")));

        let mut indirect = IndirectPage::new();
        indirect.set_reference(
            7,
            PageReference::persisted(
                strata_common::StorageKey::new(64, 9),
                strata_common::Checksum::compute(b"child"),
            ),
        );

        let mut root = RevisionRootPage::bootstrap();
        root.note_record_written(RecordKey::new(645), true);

        let mut names = NamePage::new();
        names.intern("tag");

        let mut uber = UberPage::bootstrap();
        uber.add_pages_written(4);

        vec![
            Page::Leaf(leaf),
            Page::Indirect(indirect),
            Page::RevisionRoot(root),
            Page::Name(names),
            Page::Uber(uber),
        ]
    }

    #[test]
    fn every_kind_round_trips() {
        for page in sample_pages() {
            let bytes = page.to_bytes();
            let parsed = Page::from_bytes(&bytes).unwrap();
            assert_eq!(parsed, page, "{} page", page.kind_name());
        }
    }

    #[test]
    fn kind_tags_are_distinct() {
        let pages = sample_pages();
        let mut kinds: Vec<u8> = pages.iter().map(Page::kind).collect();
        kinds.dedup();
        assert_eq!(kinds.len(), pages.len());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = Page::from_bytes(&[0xEE, 0, 0]).unwrap_err();
        assert!(err.to_string().contains("unknown page kind"));
    }

    #[test]
    fn kind_mismatch_is_descriptive() {
        let page = Page::Name(NamePage::new());
        let err = page.into_leaf().unwrap_err();
        assert_eq!(
            err.to_string(),
            "corrupt store: expected leaf page, found name page"
        );
    }

    #[test]
    fn serialization_is_deterministic() {
        for page in sample_pages() {
            assert_eq!(page.to_bytes(), page.clone().to_bytes());
        }
    }
}
