//! Shared fixtures for the integration suites.
//!
//! Everything here panics on failure; these helpers exist to keep the test
//! bodies focused on the behavior under test.

use bytes::Bytes;
use strata_engine::{
    OpenOptions, RecordKey, Resource, ResourceConfig, Revision, Session,
};
use tempfile::TempDir;

/// In-memory configuration with a tight cache, suitable for most tests.
#[must_use]
pub fn memory_config() -> ResourceConfig {
    ResourceConfig::for_testing()
}

/// File-backed configuration for tests that reopen the resource.
#[must_use]
pub fn file_config() -> ResourceConfig {
    ResourceConfig::for_testing().with_backend(strata_engine::BackendKind::File)
}

/// Creates a resource in a fresh temporary directory.
///
/// The directory guard must stay alive for as long as the session is used.
#[must_use]
pub fn scratch_resource(config: ResourceConfig) -> (TempDir, Session) {
    let dir = tempfile::tempdir().expect("temporary directory");
    let session = Resource::create(dir.path(), config, OpenOptions::new())
        .expect("resource creation");
    (dir, session)
}

/// Shorthand for a record key.
#[must_use]
pub const fn key(raw: u64) -> RecordKey {
    RecordKey::new(raw)
}

/// Shorthand for a record value.
#[must_use]
pub fn value(text: &str) -> Bytes {
    Bytes::copy_from_slice(text.as_bytes())
}

/// Writes one batch of records and commits it, returning the new revision.
pub fn commit_records(session: &Session, entries: &[(u64, &str)]) -> Revision {
    let mut txn = session.begin_write().expect("write transaction");
    for (raw, text) in entries {
        txn.set_record(key(*raw), value(text)).expect("set record");
    }
    txn.commit().expect("commit")
}

/// Reads a record at the given revision (or the newest one) as UTF-8 text.
#[must_use]
pub fn read_text(session: &Session, revision: Option<Revision>, raw: u64) -> Option<String> {
    let txn = session.begin_read(revision).expect("read transaction");
    txn.get_record(key(raw))
        .expect("get record")
        .map(|bytes| String::from_utf8(bytes.to_vec()).expect("utf-8 record"))
}
