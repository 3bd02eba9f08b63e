//! The in-memory backend.

use parking_lot::RwLock;

use strata_common::constants::DATA_REGION_START;
use strata_common::{Checksum, StorageKey, StoreError, StoreResult};
use strata_page::Page;
use strata_pipeline::Pipeline;

use crate::backend::{PageReader, PageWriter};

/// Volatile arena store for tests and scratch resources.
///
/// Offsets mirror the file backend: the arena begins at
/// [`DATA_REGION_START`], so locators are interchangeable between backends
/// and the null locator stays unambiguous.
pub struct MemoryBackend {
    arena: RwLock<Vec<u8>>,
    root: RwLock<Option<(StorageKey, Checksum)>>,
    pipeline: Pipeline,
}

impl MemoryBackend {
    /// Creates an empty arena.
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            arena: RwLock::new(vec![0; DATA_REGION_START as usize]),
            root: RwLock::new(None),
            pipeline,
        }
    }
}

impl PageReader for MemoryBackend {
    fn read_page(&self, key: StorageKey, checksum: Checksum) -> StoreResult<Page> {
        let encoded = {
            let arena = self.arena.read();
            let start = key.offset as usize;
            let end = start.saturating_add(key.length as usize);
            if end > arena.len() {
                return Err(StoreError::corrupt(format!("page at {key} outside arena")));
            }
            arena[start..end].to_vec()
        };

        let computed = Checksum::compute(&encoded);
        if computed != checksum {
            return Err(StoreError::ChecksumMismatch {
                expected: checksum,
                computed,
                offset: key.offset,
            });
        }

        let decoded = self.pipeline.decode(encoded)?;
        Page::from_bytes(&decoded)
    }

    fn read_root(&self) -> StoreResult<Option<(StorageKey, Checksum)>> {
        Ok(*self.root.read())
    }
}

impl PageWriter for MemoryBackend {
    fn write_page(&self, page: &Page) -> StoreResult<(StorageKey, Checksum)> {
        let mut raw = Vec::new();
        page.serialize(&mut raw);
        let encoded = self.pipeline.encode(raw)?;
        let checksum = Checksum::compute(&encoded);

        let mut arena = self.arena.write();
        let offset = arena.len() as u64;
        arena.extend_from_slice(&encoded);

        Ok((StorageKey::new(offset, encoded.len() as u32), checksum))
    }

    fn write_root(&self, key: StorageKey, checksum: Checksum) -> StoreResult<()> {
        *self.root.write() = Some((key, checksum));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use strata_page::{IndirectPage, NamePage};

    use super::*;

    #[test]
    fn starts_empty() {
        let backend = MemoryBackend::new(Pipeline::identity());
        assert_eq!(backend.read_root().unwrap(), None);
    }

    #[test]
    fn page_round_trip() {
        let backend = MemoryBackend::new(Pipeline::identity());
        let page = Page::Indirect(IndirectPage::new());

        let (key, checksum) = backend.write_page(&page).unwrap();
        assert_eq!(key.offset, DATA_REGION_START);
        assert_eq!(backend.read_page(key, checksum).unwrap(), page);
    }

    #[test]
    fn root_swap_is_visible() {
        let backend = MemoryBackend::new(Pipeline::identity());
        let (key, checksum) = backend.write_page(&Page::Name(NamePage::new())).unwrap();
        backend.write_root(key, checksum).unwrap();
        assert_eq!(backend.read_root().unwrap(), Some((key, checksum)));
    }

    #[test]
    fn wrong_checksum_is_detected() {
        let backend = MemoryBackend::new(Pipeline::identity());
        let (key, _) = backend.write_page(&Page::Name(NamePage::new())).unwrap();

        let err = backend
            .read_page(key, Checksum::compute(b"other"))
            .unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn out_of_range_locator_is_rejected() {
        let backend = MemoryBackend::new(Pipeline::identity());
        let err = backend
            .read_page(StorageKey::new(1 << 20, 64), Checksum::ZERO)
            .unwrap_err();
        assert!(err.is_integrity());
    }
}
