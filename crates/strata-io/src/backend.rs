//! Backend traits and construction.

use std::path::Path;
use std::sync::Arc;

use strata_common::constants::DATA_FILE_NAME;
use strata_common::{BackendKind, Checksum, StorageKey, StoreError, StoreResult};
use strata_page::Page;
use strata_pipeline::Pipeline;

use crate::file::FileBackend;
use crate::memory::MemoryBackend;

/// Read half of a storage backend.
pub trait PageReader: Send + Sync {
    /// Reads the page at `key`: fetch the encoded bytes, verify them
    /// against `checksum`, run the pipeline in reverse, deserialize.
    fn read_page(&self, key: StorageKey, checksum: Checksum) -> StoreResult<Page>;

    /// Reads the root beacon. `None` means no root was ever published.
    fn read_root(&self) -> StoreResult<Option<(StorageKey, Checksum)>>;
}

/// Write half of a storage backend. Every writer is also a reader.
pub trait PageWriter: PageReader {
    /// Encodes and appends `page`, returning its locator and digest. The
    /// bytes are not durable until the next [`PageWriter::write_root`].
    fn write_page(&self, page: &Page) -> StoreResult<(StorageKey, Checksum)>;

    /// Publishes a new root: appended data is made durable first, then the
    /// beacon is swapped and made durable in turn.
    fn write_root(&self, key: StorageKey, checksum: Checksum) -> StoreResult<()>;
}

/// Creates the backing store for a new resource under `dir`.
pub fn create_backend(
    kind: BackendKind,
    dir: &Path,
    pipeline: Pipeline,
) -> StoreResult<Arc<dyn PageWriter>> {
    match kind {
        BackendKind::File => Ok(Arc::new(FileBackend::create(
            &dir.join(DATA_FILE_NAME),
            pipeline,
        )?)),
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new(pipeline))),
    }
}

/// Opens the backing store of an existing resource under `dir`.
pub fn open_backend(
    kind: BackendKind,
    dir: &Path,
    pipeline: Pipeline,
) -> StoreResult<Arc<dyn PageWriter>> {
    match kind {
        BackendKind::File => Ok(Arc::new(FileBackend::open(
            &dir.join(DATA_FILE_NAME),
            pipeline,
        )?)),
        BackendKind::Memory => Err(StoreError::invalid_config(
            "memory-backed resources do not outlive their session",
        )),
    }
}

/// Whether a resource's backing store exists under `dir`.
#[must_use]
pub fn backend_exists(kind: BackendKind, dir: &Path) -> bool {
    match kind {
        BackendKind::File => FileBackend::exists(&dir.join(DATA_FILE_NAME)),
        BackendKind::Memory => false,
    }
}
