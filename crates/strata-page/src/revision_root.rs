//! Revision root pages.

use bytes::{Buf, BufMut};

use strata_common::{RecordKey, Revision, StoreError, StoreResult, Timestamp};

use crate::reference::PageReference;

const NO_MAX_KEY: u64 = u64::MAX;

/// Root page of one committed revision.
///
/// Anchors the revision's data tree and name dictionary and carries its
/// bookkeeping: the commit timestamp, the live record count, and the
/// highest record key written up to this revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRootPage {
    revision: Revision,
    timestamp: Timestamp,
    record_count: u64,
    max_record_key: Option<RecordKey>,
    data_ref: PageReference,
    name_ref: PageReference,
}

impl RevisionRootPage {
    /// Creates the root of the empty bootstrap revision.
    #[must_use]
    pub fn bootstrap() -> Self {
        Self {
            revision: Revision::ZERO,
            timestamp: Timestamp::now(),
            record_count: 0,
            max_record_key: None,
            data_ref: PageReference::Unresolved,
            name_ref: PageReference::Unresolved,
        }
    }

    /// Clones this root as the starting point of the next revision.
    ///
    /// References still point at this revision's pages; the write
    /// transaction rebinds them as it dirties paths.
    #[must_use]
    pub fn clone_for_next(&self) -> Self {
        let mut next = self.clone();
        next.revision = self.revision.next();
        next
    }

    /// Revision this root belongs to.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Commit wall-clock time of the revision.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Stamps the root with its commit time.
    pub fn set_timestamp(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Number of live records in the revision.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Highest record key ever written up to this revision.
    #[must_use]
    pub fn max_record_key(&self) -> Option<RecordKey> {
        self.max_record_key
    }

    /// Root reference of the data tree.
    #[must_use]
    pub fn data_ref(&self) -> &PageReference {
        &self.data_ref
    }

    /// Replaces the data tree root reference.
    pub fn set_data_ref(&mut self, reference: PageReference) {
        self.data_ref = reference;
    }

    /// Reference to the name dictionary.
    #[must_use]
    pub fn name_ref(&self) -> &PageReference {
        &self.name_ref
    }

    /// Replaces the name dictionary reference.
    pub fn set_name_ref(&mut self, reference: PageReference) {
        self.name_ref = reference;
    }

    /// Records the effect of a slot write on the bookkeeping counters.
    pub fn note_record_written(&mut self, key: RecordKey, created: bool) {
        if created {
            self.record_count += 1;
        }
        if self.max_record_key.map_or(true, |max| key > max) {
            self.max_record_key = Some(key);
        }
    }

    /// Records the removal of a live record.
    pub fn note_record_removed(&mut self) {
        self.record_count = self.record_count.saturating_sub(1);
    }

    /// Writes the root to `buf`.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.revision.as_u64());
        buf.put_u64(self.timestamp.as_micros());
        buf.put_u64(self.record_count);
        buf.put_u64(self.max_record_key.map_or(NO_MAX_KEY, RecordKey::as_u64));
        buf.put_u16(2);
        self.data_ref.serialize(buf);
        self.name_ref.serialize(buf);
    }

    /// Reads a root from `buf`.
    pub fn deserialize(buf: &mut impl Buf) -> StoreResult<Self> {
        if buf.remaining() < 34 {
            return Err(StoreError::decode("truncated revision root page"));
        }
        let revision = Revision::new(buf.get_u64());
        let timestamp = Timestamp::from_micros(buf.get_u64());
        let record_count = buf.get_u64();
        let max_record_key = match buf.get_u64() {
            NO_MAX_KEY => None,
            raw => Some(RecordKey::new(raw)),
        };
        let refs = buf.get_u16();
        if refs != 2 {
            return Err(StoreError::decode(format!(
                "revision root carries {refs} references, expected 2"
            )));
        }
        Ok(Self {
            revision,
            timestamp,
            record_count,
            max_record_key,
            data_ref: PageReference::deserialize(buf)?,
            name_ref: PageReference::deserialize(buf)?,
        })
    }
}
