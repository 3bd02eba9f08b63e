//! The disk overflow tier of a transaction log.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};

use strata_common::constants::{SPILL_HEADER_SIZE, SPILL_MAGIC, SPILL_VERSION};
use strata_common::{LogKey, StoreError, StoreResult};
use strata_page::PageContainer;

#[derive(Debug, Clone, Copy)]
struct SpillSlot {
    offset: u64,
    length: u32,
    crc: u32,
}

/// Overflow store for dirty pages demoted out of a transaction log's cache
/// tier.
///
/// Records are appended with the framing `log key (9 B) | length (4 B) |
/// crc32 (4 B) | container bytes` and indexed in memory; re-putting a key
/// appends a fresh record and abandons the old bytes. The file is
/// transaction-scoped scratch: created lazily, deleted when the
/// transaction ends, and never read by anyone else.
pub struct SpillLog {
    path: PathBuf,
    file: File,
    index: HashMap<LogKey, SpillSlot>,
    append_pos: u64,
}

impl SpillLog {
    /// Creates the overflow file at `path`, truncating leftovers from a
    /// previous crash.
    pub fn create(path: &Path) -> StoreResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut header = BytesMut::with_capacity(SPILL_HEADER_SIZE as usize);
        header.put_u32(SPILL_MAGIC);
        header.put_u32(SPILL_VERSION);
        file.write_all(&header)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            index: HashMap::new(),
            append_pos: SPILL_HEADER_SIZE,
        })
    }

    /// Appends `container` under `key`, superseding any previous record.
    pub fn put(&mut self, key: LogKey, container: &PageContainer) -> StoreResult<()> {
        let mut payload = Vec::new();
        container.serialize(&mut payload);
        let crc = crc32fast::hash(&payload);

        let mut record = BytesMut::with_capacity(LogKey::SIZE + 8 + payload.len());
        key.serialize(&mut record);
        record.put_u32(payload.len() as u32);
        record.put_u32(crc);
        record.put_slice(&payload);

        self.file.seek(SeekFrom::Start(self.append_pos))?;
        self.file.write_all(&record)?;

        let payload_offset = self.append_pos + (LogKey::SIZE + 8) as u64;
        self.index.insert(
            key,
            SpillSlot {
                offset: payload_offset,
                length: payload.len() as u32,
                crc,
            },
        );
        self.append_pos += record.len() as u64;
        Ok(())
    }

    /// Loads the container stored under `key` without removing it.
    pub fn get(&mut self, key: &LogKey) -> StoreResult<Option<PageContainer>> {
        let Some(slot) = self.index.get(key).copied() else {
            return Ok(None);
        };
        self.read_slot(*key, slot).map(Some)
    }

    /// Removes and returns the container stored under `key`. The bytes
    /// stay abandoned in the file.
    pub fn take(&mut self, key: &LogKey) -> StoreResult<Option<PageContainer>> {
        let Some(slot) = self.index.remove(key) else {
            return Ok(None);
        };
        self.read_slot(*key, slot).map(Some)
    }

    /// Drops the record under `key` from the index without reading it.
    pub fn forget(&mut self, key: &LogKey) {
        self.index.remove(key);
    }

    /// Whether a record exists under `key`.
    #[must_use]
    pub fn contains(&self, key: &LogKey) -> bool {
        self.index.contains_key(key)
    }

    /// Indexed keys, unordered.
    #[must_use]
    pub fn keys(&self) -> Vec<LogKey> {
        self.index.keys().copied().collect()
    }

    /// Number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no records are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Deletes the backing file.
    pub fn destroy(self) -> StoreResult<()> {
        drop(self.file);
        std::fs::remove_file(&self.path)?;
        Ok(())
    }

    fn read_slot(&mut self, key: LogKey, slot: SpillSlot) -> StoreResult<PageContainer> {
        let mut payload = vec![0u8; slot.length as usize];
        self.file.seek(SeekFrom::Start(slot.offset))?;
        self.file.read_exact(&mut payload)?;

        if crc32fast::hash(&payload) != slot.crc {
            return Err(StoreError::corrupt(format!(
                "overflow record for {key} failed crc check"
            )));
        }

        let mut buf = &payload[..];
        PageContainer::deserialize(&mut buf)
    }
}
