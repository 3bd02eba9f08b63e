//! Read transactions and the shared committed-state view behind them.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use strata_cache::LruCache;
use strata_common::constants::INDIRECT_LEVEL_COUNT;
use strata_common::{
    Checksum, PageKey, RecordKey, Revision, StorageKey, StoreError, StoreResult, Timestamp,
};
use strata_page::{
    IndirectPage, LeafPage, NamePage, Page, PageReference, RecordSlot, RevisionRootPage, UberPage,
};

use crate::session::SessionCore;

/// Committed state pinned to one revision.
///
/// This is the read half shared by read transactions and by the
/// fall-through path of the write transaction: it resolves records against
/// pages that are already stored, never against dirty state. The uber page
/// is pinned at open, so commits that land later cannot change what the
/// view resolves. Two caches keep the tree walks cheap: raw pages keyed by
/// store offset (immutable, shared across revisions) and reconstructed
/// leaves keyed by page key.
pub(crate) struct ReadView {
    core: Arc<SessionCore>,
    uber: UberPage,
    root: RevisionRootPage,
    names: NamePage,
    leaf_cache: Mutex<LruCache<u64, Arc<LeafPage>>>,
    page_cache: Mutex<LruCache<u64, Arc<Page>>>,
}

impl ReadView {
    /// Opens the view for `revision`, resolving its revision root through
    /// the revision tree of the currently published uber page.
    pub(crate) fn open(core: Arc<SessionCore>, revision: Revision) -> StoreResult<Self> {
        let capacity = core.config().cache_capacity;
        let uber = core.current_uber();

        let mut view = Self {
            core,
            uber,
            root: RevisionRootPage::bootstrap(),
            names: NamePage::new(),
            leaf_cache: Mutex::new(LruCache::new(capacity)),
            page_cache: Mutex::new(LruCache::new(capacity)),
        };

        let Some((key, checksum)) = view.descend(view.uber.tree_ref(), revision.as_u64())? else {
            return Err(StoreError::corrupt(format!(
                "revision {revision} missing from revision tree"
            )));
        };
        let root = view.core.backend().read_page(key, checksum)?.into_revision_root()?;
        if root.revision() != revision {
            return Err(StoreError::corrupt(format!(
                "revision tree pointed revision {revision} at root of {}",
                root.revision()
            )));
        }

        let names = match root.name_ref().as_persisted() {
            Some((key, checksum)) => {
                let page = view.cached_page(key, checksum)?;
                page.as_ref().clone().into_name()?
            }
            None => NamePage::new(),
        };

        view.root = root;
        view.names = names;
        Ok(view)
    }

    pub(crate) fn core(&self) -> &Arc<SessionCore> {
        &self.core
    }

    pub(crate) fn root(&self) -> &RevisionRootPage {
        &self.root
    }

    pub(crate) fn names(&self) -> &NamePage {
        &self.names
    }

    pub(crate) fn revision(&self) -> Revision {
        self.root.revision()
    }

    /// Resolves the record stored under `key` at this view's revision.
    pub(crate) fn get_record(&self, key: RecordKey) -> StoreResult<Option<Bytes>> {
        let Some(leaf) = self.leaf_for(key.page_key())? else {
            return Ok(None);
        };
        Ok(match leaf.slot(key.slot()) {
            Some(RecordSlot::Value(value)) => Some(value.clone()),
            Some(RecordSlot::Tombstone) | None => None,
        })
    }

    /// Returns the reconstructed leaf for `page_key`, or `None` when the
    /// page does not exist at this revision.
    pub(crate) fn leaf_for(&self, page_key: PageKey) -> StoreResult<Option<Arc<LeafPage>>> {
        if let Some(leaf) = self.leaf_cache.lock().get(&page_key.as_u64()) {
            return Ok(Some(Arc::clone(leaf)));
        }

        let gathered = self.gather_instances(page_key)?;
        if gathered.is_empty() {
            return Ok(None);
        }
        let complete = self
            .core
            .revisioning()
            .combine_read(page_key, self.revision(), &gathered);
        let leaf = Arc::new(complete);
        self.leaf_cache
            .lock()
            .insert(page_key.as_u64(), Arc::clone(&leaf));
        Ok(Some(leaf))
    }

    /// Collects the stored instances of `page_key` needed to reconstruct
    /// it, newest first.
    ///
    /// Walks the revision history backwards from this view's revision. The
    /// same instance reachable from several revisions is collected once;
    /// the walk stops as soon as the revisioning policy has enough, or when
    /// a revision no longer reaches the page (copy-on-write trees never
    /// unlink, so no older revision can reach it either).
    pub(crate) fn gather_instances(&self, page_key: PageKey) -> StoreResult<Vec<LeafPage>> {
        let policy = self.core.revisioning();
        let mut gathered: Vec<LeafPage> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();

        for rev in (0..=self.revision().as_u64()).rev() {
            let data_ref = if rev == self.revision().as_u64() {
                *self.root.data_ref()
            } else {
                *self.load_revision_root(Revision::new(rev))?.data_ref()
            };
            let Some((key, checksum)) = self.descend(&data_ref, page_key.as_u64())? else {
                break;
            };
            if !seen.insert(key.offset) {
                continue;
            }
            let page = self.cached_page(key, checksum)?;
            let leaf = page.as_leaf()?;
            if policy.wants_instance(gathered.len(), leaf.revision()) {
                gathered.push(leaf.clone());
                if policy.gather_done(&gathered) {
                    break;
                }
            }
        }
        Ok(gathered)
    }

    /// Loads the revision root of `revision` through the pinned revision
    /// tree.
    pub(crate) fn load_revision_root(&self, revision: Revision) -> StoreResult<RevisionRootPage> {
        let Some((key, checksum)) = self.descend(self.uber.tree_ref(), revision.as_u64())? else {
            return Err(StoreError::corrupt(format!(
                "revision {revision} missing from revision tree"
            )));
        };
        match self.cached_page(key, checksum)?.as_ref() {
            Page::RevisionRoot(root) => Ok(root.clone()),
            other => Err(StoreError::corrupt(format!(
                "expected revision root page, found {} page",
                other.kind_name()
            ))),
        }
    }

    /// Clones the stored indirect page behind a persisted reference.
    pub(crate) fn read_indirect(
        &self,
        key: StorageKey,
        checksum: Checksum,
    ) -> StoreResult<IndirectPage> {
        Ok(self.cached_page(key, checksum)?.as_indirect()?.clone())
    }

    /// Walks all indirect levels from `from`, following the offsets `path_key`
    /// selects, down to the locator of the addressed leaf-level page.
    ///
    /// Both trees share the geometry, so `path_key` is a page key when
    /// descending from a revision root and a revision number when descending
    /// from an uber page.
    pub(crate) fn descend(
        &self,
        from: &PageReference,
        path_key: u64,
    ) -> StoreResult<Option<(StorageKey, Checksum)>> {
        let path = PageKey::new(path_key);
        let mut current = *from;
        for level in 0..INDIRECT_LEVEL_COUNT {
            let Some((key, checksum)) = current.as_persisted() else {
                return Ok(None);
            };
            let page = self.cached_page(key, checksum)?;
            current = *page.as_indirect()?.reference(path.indirect_offset(level));
        }
        Ok(current.as_persisted())
    }

    /// Reads the page behind a locator, memoized by store offset. Stored
    /// pages are immutable, so entries never go stale.
    fn cached_page(&self, key: StorageKey, checksum: Checksum) -> StoreResult<Arc<Page>> {
        if let Some(page) = self.page_cache.lock().get(&key.offset) {
            return Ok(Arc::clone(page));
        }
        let page = Arc::new(self.core.backend().read_page(key, checksum)?);
        self.page_cache.lock().insert(key.offset, Arc::clone(&page));
        Ok(page)
    }
}

/// A read-only transaction pinned to one revision.
///
/// Readers never block each other or the writer; they resolve every record
/// against the revision they were started on, no matter what commits later.
pub struct ReadTxn {
    view: ReadView,
    closed: AtomicBool,
}

impl ReadTxn {
    pub(crate) fn new(view: ReadView) -> Self {
        Self {
            view,
            closed: AtomicBool::new(false),
        }
    }

    /// The revision this transaction reads.
    pub fn revision(&self) -> Revision {
        self.view.revision()
    }

    /// Commit timestamp of the pinned revision.
    pub fn timestamp(&self) -> Timestamp {
        self.view.root().timestamp()
    }

    /// Number of live records at the pinned revision.
    pub fn record_count(&self) -> u64 {
        self.view.root().record_count()
    }

    /// Largest record key ever written up to the pinned revision.
    pub fn max_record_key(&self) -> Option<RecordKey> {
        self.view.root().max_record_key()
    }

    /// Reads the record stored under `key`. `None` means the record does
    /// not exist at this revision, either never written or removed.
    pub fn get_record(&self, key: RecordKey) -> StoreResult<Option<Bytes>> {
        self.ensure_open()?;
        if !key.is_addressable() {
            return Err(StoreError::usage(format!(
                "record key {} out of addressable range",
                key.as_u64()
            )));
        }
        self.view.get_record(key)
    }

    /// Resolves an interned name key.
    pub fn name_for_key(&self, key: u32) -> StoreResult<Option<&str>> {
        self.ensure_open()?;
        Ok(self.view.names().name(key))
    }

    /// Looks up the key a name was interned under.
    pub fn key_for_name(&self, name: &str) -> StoreResult<Option<u32>> {
        self.ensure_open()?;
        Ok(self.view.names().key(name))
    }

    /// Whether [`ReadTxn::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the transaction. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.view.core().stats().record_reader_closed();
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::closed("read transaction"));
        }
        Ok(())
    }
}

impl Drop for ReadTxn {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ReadTxn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadTxn")
            .field("revision", &self.revision())
            .field("closed", &self.is_closed())
            .finish()
    }
}
