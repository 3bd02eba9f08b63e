//! Sessions bind an opened resource to its transactions.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use strata_common::{
    Checksum, ResourceConfig, Revision, StorageKey, StoreError, StoreResult,
};
use strata_io::PageWriter;
use strata_page::{PageReference, UberPage};

use crate::read::{ReadTxn, ReadView};
use crate::revisioning::Revisioning;
use crate::write::WriteTxn;

/// Monotonic counters describing session activity.
#[derive(Debug, Default)]
pub struct SessionStats {
    commits: AtomicU64,
    aborts: AtomicU64,
    readers_opened: AtomicU64,
    active_readers: AtomicU64,
    pages_written: AtomicU64,
}

impl SessionStats {
    /// Revisions committed through this session.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Write transactions that ended without committing.
    pub fn aborts(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }

    /// Read transactions started over the session's lifetime.
    pub fn readers_opened(&self) -> u64 {
        self.readers_opened.load(Ordering::Relaxed)
    }

    /// Read transactions currently open.
    pub fn active_readers(&self) -> u64 {
        self.active_readers.load(Ordering::Relaxed)
    }

    /// Pages persisted by committed transactions.
    pub fn pages_written(&self) -> u64 {
        self.pages_written.load(Ordering::Relaxed)
    }

    pub(crate) fn record_commit(&self, pages: u64) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.pages_written.fetch_add(pages, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reader_opened(&self) {
        self.readers_opened.fetch_add(1, Ordering::Relaxed);
        self.active_readers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reader_closed(&self) {
        self.active_readers.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The uber page a session currently serves reads from, together with the
/// locator it was published under.
struct CommittedState {
    uber: UberPage,
    location: (StorageKey, Checksum),
}

/// State shared between a session and every transaction it spawned.
///
/// Transactions hold an `Arc` to the core, so a session may be closed or
/// dropped while transactions are still running; they keep reading the
/// revision they pinned at start.
pub(crate) struct SessionCore {
    config: ResourceConfig,
    dir: PathBuf,
    backend: Arc<dyn PageWriter>,
    revisioning: Revisioning,
    current: RwLock<CommittedState>,
    writer_active: AtomicBool,
    closed: AtomicBool,
    stats: SessionStats,
}

impl SessionCore {
    pub(crate) fn config(&self) -> &ResourceConfig {
        &self.config
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn backend(&self) -> &Arc<dyn PageWriter> {
        &self.backend
    }

    pub(crate) fn revisioning(&self) -> Revisioning {
        self.revisioning
    }

    pub(crate) fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub(crate) fn current_uber(&self) -> UberPage {
        self.current.read().uber.clone()
    }

    pub(crate) fn newest_revision(&self) -> Revision {
        self.current.read().uber.newest_revision()
    }

    /// Reference to the currently published uber page.
    pub(crate) fn current_root_reference(&self) -> PageReference {
        let state = self.current.read();
        PageReference::persisted(state.location.0, state.location.1)
    }

    /// Publishes a freshly committed uber page as the session's current
    /// state. The backend beacon was already swapped by the committer.
    pub(crate) fn install(&self, uber: UberPage, key: StorageKey, checksum: Checksum) {
        *self.current.write() = CommittedState {
            uber,
            location: (key, checksum),
        };
    }

    pub(crate) fn writer_released(&self) {
        self.writer_active.store(false, Ordering::Release);
    }
}

/// Handle to an opened resource.
///
/// A session hands out transactions: any number of concurrent readers, each
/// pinned to one revision, and at most one writer preparing the next
/// revision. Closing the session only stops new transactions from starting;
/// transactions already begun run to completion.
pub struct Session {
    core: Arc<SessionCore>,
}

impl Session {
    pub(crate) fn new(
        config: ResourceConfig,
        dir: PathBuf,
        backend: Arc<dyn PageWriter>,
        uber: UberPage,
        location: (StorageKey, Checksum),
    ) -> Self {
        let revisioning = Revisioning::new(config.revisioning, config.revision_window);
        Self {
            core: Arc::new(SessionCore {
                config,
                dir,
                backend,
                revisioning,
                current: RwLock::new(CommittedState { uber, location }),
                writer_active: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                stats: SessionStats::default(),
            }),
        }
    }

    /// The configuration the resource was created with.
    pub fn config(&self) -> &ResourceConfig {
        &self.core.config
    }

    /// The newest committed revision.
    pub fn most_recent_revision(&self) -> StoreResult<Revision> {
        self.ensure_open()?;
        Ok(self.core.newest_revision())
    }

    /// Starts a read transaction pinned to `revision`, or to the newest
    /// committed revision when `None`.
    pub fn begin_read(&self, revision: Option<Revision>) -> StoreResult<ReadTxn> {
        self.ensure_open()?;
        let newest = self.core.newest_revision();
        let revision = revision.unwrap_or(newest);
        if revision > newest {
            return Err(StoreError::RevisionNotFound {
                requested: revision.as_u64(),
                newest: newest.as_u64(),
            });
        }
        let view = ReadView::open(Arc::clone(&self.core), revision)?;
        self.core.stats.record_reader_opened();
        Ok(ReadTxn::new(view))
    }

    /// Starts the write transaction that will produce the next revision.
    ///
    /// At most one write transaction exists per session; a second request
    /// fails immediately with [`StoreError::WriterActive`] instead of
    /// blocking.
    pub fn begin_write(&self) -> StoreResult<WriteTxn> {
        self.ensure_open()?;
        if self
            .core
            .writer_active
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return Err(StoreError::WriterActive);
        }
        match WriteTxn::begin(Arc::clone(&self.core)) {
            Ok(txn) => Ok(txn),
            Err(err) => {
                self.core.writer_released();
                Err(err)
            }
        }
    }

    /// Activity counters for this session.
    pub fn stats(&self) -> &SessionStats {
        &self.core.stats
    }

    /// Whether [`Session::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::Acquire)
    }

    /// Closes the session. Idempotent; running transactions are unaffected,
    /// new ones are refused.
    pub fn close(&self) {
        if !self.core.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(dir = %self.core.dir.display(), "session closed");
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::closed("session"));
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("dir", &self.core.dir)
            .field("newest_revision", &self.core.newest_revision())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
