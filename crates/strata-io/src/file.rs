//! The append-only file backend.
//!
//! Layout of a data file:
//!
//! ```text
//! offset  0   magic "STRA" (4 B) | format version (4 B)
//! offset  8   root beacon: offset (8 B) | length (4 B) | checksum (16 B)
//! offset 36   zero padding
//! offset 64   data region: encoded pages appended back to back
//! ```
//!
//! Appends reach the file before the beacon moves, so a crash between the
//! two leaves the previous root intact and merely orphans unreferenced
//! bytes at the tail.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::{BufMut, BytesMut};
use parking_lot::Mutex;

use strata_common::constants::{
    BEACON_OFFSET, BEACON_SIZE, DATA_REGION_START, FILE_MAGIC, FILE_VERSION,
};
use strata_common::{Checksum, StorageKey, StoreError, StoreResult};
use strata_page::Page;
use strata_pipeline::Pipeline;

use crate::backend::{PageReader, PageWriter};

/// Append-only single-file store.
#[derive(Debug)]
pub struct FileBackend {
    state: Mutex<FileState>,
    pipeline: Pipeline,
}

#[derive(Debug)]
struct FileState {
    file: File,
    append_pos: u64,
}

impl FileBackend {
    /// Creates a fresh data file at `path`. Fails if the file exists.
    pub fn create(path: &Path, pipeline: Pipeline) -> StoreResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut header = BytesMut::with_capacity(DATA_REGION_START as usize);
        header.put_u32(FILE_MAGIC);
        header.put_u32(FILE_VERSION);
        header.put_bytes(0, DATA_REGION_START as usize - 8);
        file.write_all(&header)?;
        file.sync_all()?;

        Ok(Self {
            state: Mutex::new(FileState {
                file,
                append_pos: DATA_REGION_START,
            }),
            pipeline,
        })
    }

    /// Opens an existing data file at `path`.
    pub fn open(path: &Path, pipeline: Pipeline) -> StoreResult<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header)
            .map_err(|_| StoreError::corrupt("data file shorter than its header"))?;
        let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if magic != FILE_MAGIC {
            return Err(StoreError::corrupt(format!(
                "bad data file magic {magic:#010x}"
            )));
        }
        if version != FILE_VERSION {
            return Err(StoreError::corrupt(format!(
                "unsupported data file version {version}"
            )));
        }

        let len = file.metadata()?.len();
        if len < DATA_REGION_START {
            return Err(StoreError::corrupt("data file truncated before data region"));
        }

        Ok(Self {
            state: Mutex::new(FileState {
                file,
                append_pos: len,
            }),
            pipeline,
        })
    }

    /// Whether an initialized data file exists at `path`.
    #[must_use]
    pub fn exists(path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|m| m.is_file() && m.len() >= DATA_REGION_START)
            .unwrap_or(false)
    }
}

impl PageReader for FileBackend {
    fn read_page(&self, key: StorageKey, checksum: Checksum) -> StoreResult<Page> {
        let mut encoded = vec![0u8; key.length as usize];
        {
            let mut state = self.state.lock();
            state.file.seek(SeekFrom::Start(key.offset))?;
            state.file.read_exact(&mut encoded).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    StoreError::corrupt(format!("page at {key} extends past end of file"))
                } else {
                    StoreError::from(e)
                }
            })?;
        }

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
        let mut beacon = [0u8; BEACON_SIZE];
        {
            let mut state = self.state.lock();
            state.file.seek(SeekFrom::Start(BEACON_OFFSET))?;
            state.file.read_exact(&mut beacon)?;
        }

        let mut buf = &beacon[..];
        let key = StorageKey::deserialize(&mut buf)?;
        let checksum = Checksum::deserialize(&mut buf)?;
        Ok(if key.is_null() {
            None
        } else {
            Some((key, checksum))
        })
    }
}

impl PageWriter for FileBackend {
    fn write_page(&self, page: &Page) -> StoreResult<(StorageKey, Checksum)> {
        let mut raw = Vec::new();
        page.serialize(&mut raw);
        let encoded = self.pipeline.encode(raw)?;
        let checksum = Checksum::compute(&encoded);

        let mut state = self.state.lock();
        let offset = state.append_pos;
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(&encoded)?;
        state.append_pos = offset + encoded.len() as u64;

        Ok((StorageKey::new(offset, encoded.len() as u32), checksum))
    }

    fn write_root(&self, key: StorageKey, checksum: Checksum) -> StoreResult<()> {
        let mut beacon = BytesMut::with_capacity(BEACON_SIZE);
        key.serialize(&mut beacon);
        checksum.serialize(&mut beacon);

        let mut state = self.state.lock();
        state.file.sync_data()?;
        state.file.seek(SeekFrom::Start(BEACON_OFFSET))?;
        state.file.write_all(&beacon)?;
        state.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use strata_common::{PageKey, Revision};
    use strata_page::{LeafPage, RecordSlot};

    use super::*;

    fn sample_page() -> Page {
        let mut leaf = LeafPage::new(PageKey::new(0), Revision::ZERO);
        leaf.set_slot(5, RecordSlot::Value(Bytes::from_static(b"payload")));
        Page::Leaf(leaf)
    }

    #[test]
    fn create_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.strata");

        let backend = FileBackend::create(&path, Pipeline::identity()).unwrap();
        assert!(FileBackend::exists(&path));
        assert_eq!(backend.read_root().unwrap(), None);
        drop(backend);

        let reopened = FileBackend::open(&path, Pipeline::identity()).unwrap();
        assert_eq!(reopened.read_root().unwrap(), None);
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.strata");
        FileBackend::create(&path, Pipeline::identity()).unwrap();
        assert!(FileBackend::create(&path, Pipeline::identity()).is_err());
    }

    #[test]
    fn open_rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.strata");
        std::fs::write(&path, vec![0u8; 128]).unwrap();

        let err = FileBackend::open(&path, Pipeline::identity()).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn page_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.strata");
        let backend = FileBackend::create(&path, Pipeline::identity()).unwrap();

        let page = sample_page();
        let (key, checksum) = backend.write_page(&page).unwrap();
        assert_eq!(key.offset, DATA_REGION_START);
        assert_eq!(backend.read_page(key, checksum).unwrap(), page);
    }

    #[test]
    fn pages_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.strata");

        let page = sample_page();
        let (key, checksum) = {
            let backend = FileBackend::create(&path, Pipeline::identity()).unwrap();
            let located = backend.write_page(&page).unwrap();
            backend.write_root(located.0, located.1).unwrap();
            located
        };

        let backend = FileBackend::open(&path, Pipeline::identity()).unwrap();
        assert_eq!(backend.read_root().unwrap(), Some((key, checksum)));
        assert_eq!(backend.read_page(key, checksum).unwrap(), page);

        // Appends after reopen land past the existing data.
        let (next, _) = backend.write_page(&page).unwrap();
        assert_eq!(next.offset, key.offset + u64::from(key.length));
    }

    #[test]
    fn wrong_checksum_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.strata");
        let backend = FileBackend::create(&path, Pipeline::identity()).unwrap();

        let (key, _) = backend.write_page(&sample_page()).unwrap();
        let bogus = Checksum::compute(b"somebody else");
        let err = backend.read_page(key, bogus).unwrap_err();
        assert!(matches!(err, StoreError::ChecksumMismatch { .. }));
    }

    #[test]
    fn tampered_bytes_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.strata");
        let backend = FileBackend::create(&path, Pipeline::identity()).unwrap();

        let (key, checksum) = backend.write_page(&sample_page()).unwrap();
        drop(backend);

        // Flip one byte in the middle of the stored page.
        let mut raw = std::fs::read(&path).unwrap();
        let target = key.offset as usize + key.length as usize / 2;
        raw[target] ^= 0xFF;
        std::fs::write(&path, raw).unwrap();

        let backend = FileBackend::open(&path, Pipeline::identity()).unwrap();
        let err = backend.read_page(key, checksum).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn unpublished_appends_stay_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.strata");
        let backend = FileBackend::create(&path, Pipeline::identity()).unwrap();

        let (first, first_sum) = backend.write_page(&sample_page()).unwrap();
        backend.write_root(first, first_sum).unwrap();
        backend.write_page(&sample_page()).unwrap();

        assert_eq!(backend.read_root().unwrap(), Some((first, first_sum)));
    }

    #[test]
    fn encoded_pipeline_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.strata");
        let pipeline = Pipeline::from_config(
            &strata_common::Compression::zstd_default(),
            &strata_common::Encryption::None,
            None,
        )
        .unwrap();
        let backend = FileBackend::create(&path, pipeline).unwrap();

        let page = sample_page();
        let (key, checksum) = backend.write_page(&page).unwrap();
        assert_eq!(backend.read_page(key, checksum).unwrap(), page);
    }
}
