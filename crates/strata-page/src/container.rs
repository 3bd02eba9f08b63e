//! Dirty page containers.

use bytes::{Buf, BufMut};

use strata_common::StoreResult;

use crate::page::Page;

/// One dirty page tracked by a write transaction.
///
/// `complete` is the fully reconstructed page that every read inside the
/// transaction sees; `modified` is the page that will be written at commit.
/// Under the windowed revisioning strategies `modified` may be sparse,
/// carrying only the slots this transaction touched; under a full dump the
/// two views coincide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContainer {
    complete: Page,
    modified: Page,
}

impl PageContainer {
    /// Creates a container from its two views.
    #[must_use]
    pub fn new(complete: Page, modified: Page) -> Self {
        Self { complete, modified }
    }

    /// Creates a container whose views start out identical.
    #[must_use]
    pub fn from_single(page: Page) -> Self {
        let modified = page.clone();
        Self {
            complete: page,
            modified,
        }
    }

    /// The read view.
    #[must_use]
    pub fn complete(&self) -> &Page {
        &self.complete
    }

    /// Mutable read view.
    pub fn complete_mut(&mut self) -> &mut Page {
        &mut self.complete
    }

    /// The write view.
    #[must_use]
    pub fn modified(&self) -> &Page {
        &self.modified
    }

    /// Mutable write view.
    pub fn modified_mut(&mut self) -> &mut Page {
        &mut self.modified
    }

    /// Consumes the container, keeping the write view.
    #[must_use]
    pub fn into_modified(self) -> Page {
        self.modified
    }

    /// Applies `f` to both views, keeping them in step.
    pub fn apply(&mut self, mut f: impl FnMut(&mut Page)) {
        f(&mut self.complete);
        f(&mut self.modified);
    }

    /// Writes both views to `buf`.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        self.complete.serialize(buf);
        self.modified.serialize(buf);
    }

    /// Reads a container from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        Ok(Self {
            complete: Page::deserialize(buf)?,
            modified: Page::deserialize(buf)?,
        })
    }
}
