//! The write transaction: copy-on-write mutation and the commit protocol.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use strata_cache::TxnLog;
use strata_common::constants::{
    FANOUT, FANOUT_EXPONENT, FANOUT_MASK, INDIRECT_LEVEL_COUNT, MAX_RECORD_SIZE, SPILL_FILE_NAME,
};
use strata_common::{
    Checksum, LogKey, PageKey, RecordKey, Revision, StorageKey, StoreError, StoreResult, Timestamp,
};
use strata_io::PageWriter;
use strata_page::{
    IndirectPage, NamePage, Page, PageContainer, PageReference, RecordSlot, RevisionRootPage,
    UberPage,
};

use crate::read::ReadView;
use crate::session::SessionCore;

/// Lifecycle of a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Accepting operations, nothing changed yet.
    Open,
    /// Accepting operations, changes staged.
    Dirty,
    /// Commit in progress.
    Committing,
    /// Changes published as a new revision.
    Committed,
    /// Changes discarded.
    Aborted,
}

impl TxnState {
    /// Whether the transaction still accepts operations.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::Dirty)
    }

    /// Whether the transaction reached a terminal state.
    #[must_use]
    pub const fn is_ended(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Dirty => "dirty",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        })
    }
}

/// The single write transaction of a session.
///
/// All mutation is copy-on-write: the first touch of a leaf derives a dirty
/// container from the base revision and threads its indirect path through
/// the transaction log, so committed pages are never modified. Reads through
/// the transaction see its own staged changes, then fall through to the base
/// revision.
///
/// Nothing is published until [`WriteTxn::commit`] swaps the root beacon;
/// aborting, dropping, or failing mid-commit leaves the store exactly as the
/// base revision describes it.
pub struct WriteTxn {
    base: ReadView,
    log: TxnLog,
    uber: UberPage,
    root: RevisionRootPage,
    names: NamePage,
    names_dirty: bool,
    new_revision: Revision,
    state: TxnState,
    mutations: u64,
    released: bool,
}

impl WriteTxn {
    pub(crate) fn begin(core: Arc<SessionCore>) -> StoreResult<Self> {
        let newest = core.newest_revision();
        let base = ReadView::open(core, newest)?;
        let uber = base.core().current_uber();
        let root = base.root().clone_for_next();
        let names = base.names().clone();
        let new_revision = root.revision();
        let log = TxnLog::new(
            base.core().config().cache_capacity,
            base.core().dir().join(SPILL_FILE_NAME),
        );
        tracing::debug!(
            revision = new_revision.as_u64(),
            base = newest.as_u64(),
            "write transaction started"
        );
        Ok(Self {
            base,
            log,
            uber,
            root,
            names,
            names_dirty: false,
            new_revision,
            state: TxnState::Open,
            mutations: 0,
            released: false,
        })
    }

    /// The revision this transaction will publish.
    pub fn revision(&self) -> Revision {
        self.new_revision
    }

    /// The committed revision this transaction builds on.
    pub fn base_revision(&self) -> Revision {
        self.base.revision()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Reads `key`, seeing this transaction's own staged changes first and
    /// the base revision otherwise.
    pub fn get_record(&mut self, key: RecordKey) -> StoreResult<Option<Bytes>> {
        self.ensure_active()?;
        ensure_addressable(key)?;
        let log_key = LogKey::leaf(key.page_key());
        if let Some(container) = self.log.get(&log_key)? {
            let leaf = container.complete().as_leaf()?;
            return Ok(match leaf.slot(key.slot()) {
                Some(RecordSlot::Value(value)) => Some(value.clone()),
                Some(RecordSlot::Tombstone) | None => None,
            });
        }
        self.base.get_record(key)
    }

    /// Stages `value` under `key`, creating or overwriting the record.
    pub fn set_record(&mut self, key: RecordKey, value: Bytes) -> StoreResult<()> {
        self.ensure_active()?;
        ensure_addressable(key)?;
        if value.len() > MAX_RECORD_SIZE {
            return Err(StoreError::usage(format!(
                "record of {} bytes exceeds the {MAX_RECORD_SIZE} byte limit",
                value.len()
            )));
        }

        let mut container = self.dirty_leaf(key.page_key())?;
        let created = {
            let leaf = container.complete().as_leaf()?;
            !matches!(leaf.slot(key.slot()), Some(RecordSlot::Value(_)))
        };
        container.apply(|page| {
            if let Page::Leaf(leaf) = page {
                leaf.set_slot(key.slot(), RecordSlot::Value(value.clone()));
            }
        });
        self.log.put(LogKey::leaf(key.page_key()), container)?;

        self.root.note_record_written(key, created);
        self.mutations += 1;
        self.state = TxnState::Dirty;
        Ok(())
    }

    /// Stages the removal of the record under `key`, returning whether a
    /// live record existed. Removal writes a tombstone so the slot stays
    /// buried in every later reconstruction.
    pub fn remove_record(&mut self, key: RecordKey) -> StoreResult<bool> {
        self.ensure_active()?;
        ensure_addressable(key)?;
        if self.get_record(key)?.is_none() {
            return Ok(false);
        }

        let mut container = self.dirty_leaf(key.page_key())?;
        container.apply(|page| {
            if let Page::Leaf(leaf) = page {
                leaf.set_slot(key.slot(), RecordSlot::Tombstone);
            }
        });
        self.log.put(LogKey::leaf(key.page_key()), container)?;

        self.root.note_record_removed();
        self.mutations += 1;
        self.state = TxnState::Dirty;
        Ok(true)
    }

    /// Interns `name`, returning its stable dictionary key. Interning an
    /// already-known name returns the existing key without dirtying the
    /// transaction.
    pub fn intern_name(&mut self, name: &str) -> StoreResult<u32> {
        self.ensure_active()?;
        if let Some(existing) = self.names.key(name) {
            return Ok(existing);
        }
        let key = self.names.intern(name);
        self.names_dirty = true;
        self.state = TxnState::Dirty;
        Ok(key)
    }

    /// Resolves an interned name key, including keys interned by this
    /// transaction.
    pub fn name_for_key(&self, key: u32) -> StoreResult<Option<&str>> {
        self.ensure_active()?;
        Ok(self.names.name(key))
    }

    /// Looks up the key a name was interned under.
    pub fn key_for_name(&self, name: &str) -> StoreResult<Option<u32>> {
        self.ensure_active()?;
        Ok(self.names.key(name))
    }

    /// Commits the staged changes, publishing them as a new revision.
    ///
    /// Committing with nothing staged is allowed and produces an empty
    /// revision. On failure nothing was published and the transaction ends
    /// as aborted.
    pub fn commit(&mut self) -> StoreResult<Revision> {
        self.ensure_active()?;
        self.state = TxnState::Committing;
        match self.commit_inner() {
            Ok(pages) => {
                self.state = TxnState::Committed;
                self.base.core().stats().record_commit(pages);
                self.release();
                tracing::info!(
                    revision = self.new_revision.as_u64(),
                    pages,
                    mutations = self.mutations,
                    "committed revision"
                );
                Ok(self.new_revision)
            }
            Err(err) => {
                let _ = self.log.clear();
                self.state = TxnState::Aborted;
                self.base.core().stats().record_abort();
                self.release();
                tracing::warn!(
                    revision = self.new_revision.as_u64(),
                    error = %err,
                    "commit failed; staged changes discarded"
                );
                Err(err)
            }
        }
    }

    /// Discards every staged change and ends the transaction.
    pub fn abort(&mut self) -> StoreResult<()> {
        self.ensure_active()?;
        self.log.clear()?;
        self.state = TxnState::Aborted;
        self.base.core().stats().record_abort();
        self.release();
        tracing::debug!(
            revision = self.new_revision.as_u64(),
            "write transaction aborted"
        );
        Ok(())
    }

    /// Ends the transaction, aborting first when still active. Idempotent.
    pub fn close(&mut self) -> StoreResult<()> {
        if self.state.is_active() {
            self.abort()?;
        }
        Ok(())
    }

    /// Drains the log bottom-up and publishes the new revision.
    ///
    /// Leaves persist first, then each indirect level deepest first, every
    /// parent patched to its child's locator as the child settles. The
    /// revision root follows, gets grafted into the revision tree, and the
    /// chained uber page is appended last. Only then does the root beacon
    /// move, so a crash anywhere before that leaves orphaned appends the
    /// next open never reaches.
    fn commit_inner(&mut self) -> StoreResult<u64> {
        let backend = Arc::clone(self.base.core().backend());
        let mut pages_written: u64 = 0;

        let mut keys = self.log.keys();
        keys.sort_unstable_by(|a, b| b.level().cmp(&a.level()).then_with(|| a.seq().cmp(&b.seq())));

        for log_key in keys {
            let Some(container) = self.log.take(&log_key)? else {
                continue;
            };
            let page = container.into_modified();
            // Children drain before parents, so by the time an indirect
            // page is written every child it gained this transaction has
            // been patched to its stored locator.
            if let Page::Indirect(ref indirect) = page {
                for offset in 0..FANOUT {
                    debug_assert!(
                        !indirect.reference(offset).is_dirty(),
                        "page {log_key} drained with unpatched child at offset {offset}"
                    );
                }
            }
            let (key, checksum) = backend.write_page(&page)?;
            pages_written += 1;
            self.bind_persisted(log_key, PageReference::persisted(key, checksum))?;
        }
        debug_assert!(self.log.is_empty());
        debug_assert!(!self.root.data_ref().is_dirty());

        // The name dictionary is rewritten only when it grew.
        if self.names_dirty || self.root.name_ref().is_unresolved() {
            let (key, checksum) = backend.write_page(&Page::Name(self.names.clone()))?;
            pages_written += 1;
            self.root.set_name_ref(PageReference::persisted(key, checksum));
        }

        self.root.set_timestamp(Timestamp::now());
        let (root_key, root_checksum) =
            backend.write_page(&Page::RevisionRoot(self.root.clone()))?;
        pages_written += 1;

        let tree_ref =
            self.graft_revision(&*backend, root_key, root_checksum, &mut pages_written)?;

        let previous = self.base.core().current_root_reference();
        let mut uber = self.uber.clone_for_commit(previous);
        uber.set_tree_ref(tree_ref);
        uber.add_pages_written(pages_written + 1);
        let (uber_key, uber_checksum) = backend.write_page(&Page::Uber(uber.clone()))?;
        pages_written += 1;

        self.log.clear()?;

        backend.write_root(uber_key, uber_checksum)?;
        self.base.core().install(uber, uber_key, uber_checksum);
        Ok(pages_written)
    }

    /// Returns the dirty container for the leaf at `page_key`, deriving it
    /// from the base revision on first touch and threading the indirect
    /// path through the log. The caller mutates the container and puts it
    /// back under its leaf key.
    fn dirty_leaf(&mut self, page_key: PageKey) -> StoreResult<PageContainer> {
        let log_key = LogKey::leaf(page_key);
        if let Some(container) = self.log.get(&log_key)? {
            return Ok(container);
        }
        let gathered = self.base.gather_instances(page_key)?;
        let container = self
            .base
            .core()
            .revisioning()
            .combine_write(page_key, self.new_revision, &gathered);
        // Register the container before any path page points at it, so an
        // in-memory reference never targets a missing log entry.
        self.log.put(log_key, container.clone())?;
        self.prepare_path(page_key)?;
        Ok(container)
    }

    /// Ensures every indirect page between the revision root and the leaf
    /// at `page_key` has a dirty copy in the log, each parent pointing at
    /// its in-memory child.
    fn prepare_path(&mut self, page_key: PageKey) -> StoreResult<()> {
        let mut incoming = *self.root.data_ref();
        for level in 0..INDIRECT_LEVEL_COUNT {
            let log_key = LogKey::indirect(level, page_key.indirect_seq(level));
            if !self.log.contains(&log_key) {
                let page = match incoming {
                    PageReference::Persisted { key, checksum } => {
                        self.base.read_indirect(key, checksum)?
                    }
                    PageReference::Unresolved => IndirectPage::new(),
                    PageReference::InMemory(other) => {
                        return Err(StoreError::corrupt(format!(
                            "dangling in-memory reference {other} on dirty path"
                        )));
                    }
                };
                self.log
                    .put(log_key, PageContainer::from_single(Page::Indirect(page)))?;
                self.bind_dirty(level, page_key)?;
            }
            let container = self
                .log
                .get(&log_key)?
                .ok_or_else(|| StoreError::corrupt(format!("{log_key} vanished from log")))?;
            incoming = *container
                .complete()
                .as_indirect()?
                .reference(page_key.indirect_offset(level));
        }

        let leaf_key = LogKey::leaf(page_key);
        if incoming.as_log_key() != Some(leaf_key) {
            self.bind_dirty(INDIRECT_LEVEL_COUNT, page_key)?;
        }
        Ok(())
    }

    /// Points the parent of the page at `level` (leaf pages count as one
    /// past the deepest indirect level) to the page's in-memory log entry.
    fn bind_dirty(&mut self, level: usize, page_key: PageKey) -> StoreResult<()> {
        let reference = if level == INDIRECT_LEVEL_COUNT {
            PageReference::InMemory(LogKey::leaf(page_key))
        } else {
            PageReference::InMemory(LogKey::indirect(level, page_key.indirect_seq(level)))
        };
        if level == 0 {
            self.root.set_data_ref(reference);
            return Ok(());
        }

        let parent_level = level - 1;
        let parent_key = LogKey::indirect(parent_level, page_key.indirect_seq(parent_level));
        let offset = page_key.indirect_offset(parent_level);
        let mut container = self
            .log
            .get(&parent_key)?
            .ok_or_else(|| StoreError::corrupt(format!("{parent_key} vanished from log")))?;
        container.apply(|page| {
            if let Page::Indirect(indirect) = page {
                indirect.set_reference(offset, reference);
            }
        });
        self.log.put(parent_key, container)
    }

    /// Patches the parent of a just-persisted page to its locator. Parents
    /// are still in the log at this point and persist later in the drain,
    /// except at level zero, where the parent is the revision root itself.
    fn bind_persisted(&mut self, child: LogKey, reference: PageReference) -> StoreResult<()> {
        if child.level() == 0 {
            self.root.set_data_ref(reference);
            return Ok(());
        }
        let parent_level = usize::from(child.level()) - 1;
        let parent_key = LogKey::indirect(parent_level, child.seq() >> FANOUT_EXPONENT);
        let offset = (child.seq() & FANOUT_MASK) as usize;
        let mut container = self.log.get(&parent_key)?.ok_or_else(|| {
            StoreError::corrupt(format!("parent of {child} missing from transaction log"))
        })?;
        container.apply(|page| {
            if let Page::Indirect(indirect) = page {
                indirect.set_reference(offset, reference);
            }
        });
        self.log.put(parent_key, container)
    }

    /// Builds the revision-tree path binding the new revision to its root
    /// page: clones the committed spine top-down, then rewrites it
    /// bottom-up around the new entry.
    fn graft_revision(
        &self,
        backend: &dyn PageWriter,
        root_key: StorageKey,
        root_checksum: Checksum,
        pages_written: &mut u64,
    ) -> StoreResult<PageReference> {
        let path = PageKey::new(self.new_revision.as_u64());

        let mut spine: Vec<IndirectPage> = Vec::with_capacity(INDIRECT_LEVEL_COUNT);
        let mut current = *self.uber.tree_ref();
        for level in 0..INDIRECT_LEVEL_COUNT {
            let page = match current.as_persisted() {
                Some((key, checksum)) => self.base.read_indirect(key, checksum)?,
                None => IndirectPage::new(),
            };
            current = *page.reference(path.indirect_offset(level));
            spine.push(page);
        }

        let mut child = PageReference::persisted(root_key, root_checksum);
        for level in (0..INDIRECT_LEVEL_COUNT).rev() {
            let mut page = spine
                .pop()
                .ok_or_else(|| StoreError::corrupt("revision tree spine underflow"))?;
            page.set_reference(path.indirect_offset(level), child);
            let (key, checksum) = backend.write_page(&Page::Indirect(page))?;
            *pages_written += 1;
            child = PageReference::persisted(key, checksum);
        }
        Ok(child)
    }

    fn ensure_active(&self) -> StoreResult<()> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(StoreError::usage(format!(
                "write transaction is {}",
                self.state
            )))
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.base.core().writer_released();
        }
    }
}

impl Drop for WriteTxn {
    fn drop(&mut self) {
        if self.state.is_active() {
            tracing::warn!(
                revision = self.new_revision.as_u64(),
                "write transaction dropped while active; discarding changes"
            );
            let _ = self.log.clear();
            self.state = TxnState::Aborted;
            self.base.core().stats().record_abort();
        }
        self.release();
    }
}

impl fmt::Debug for WriteTxn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTxn")
            .field("revision", &self.new_revision)
            .field("state", &self.state)
            .field("staged_pages", &self.log.len())
            .finish_non_exhaustive()
    }
}

fn ensure_addressable(key: RecordKey) -> StoreResult<()> {
    if key.is_addressable() {
        Ok(())
    } else {
        Err(StoreError::usage(format!(
            "record key {} out of addressable range",
            key.as_u64()
        )))
    }
}
