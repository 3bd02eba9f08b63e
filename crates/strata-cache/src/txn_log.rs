//! The tiered dirty-page log.

use std::path::PathBuf;

use strata_common::{LogKey, StoreResult};
use strata_page::PageContainer;

use crate::lru::{CacheStats, LruCache};
use crate::spill::SpillLog;

/// Authoritative store of a write transaction's dirty pages.
///
/// A bounded LRU tier holds the hot containers; overflowing it demotes the
/// least recently used entry into an on-disk spill tier. Lookups check the
/// cache first and promote spill hits back into it. A key lives in at most
/// one tier at a time, and the union of both tiers is the transaction's
/// ground truth, consulted before any backend read.
pub struct TxnLog {
    cache: LruCache<LogKey, PageContainer>,
    spill: Option<SpillLog>,
    spill_path: PathBuf,
}

impl TxnLog {
    /// Creates a log bounded at `capacity` hot entries, spilling into a
    /// file at `spill_path` beyond that.
    #[must_use]
    pub fn new(capacity: usize, spill_path: PathBuf) -> Self {
        Self {
            cache: LruCache::new(capacity),
            spill: None,
            spill_path,
        }
    }

    /// Registers `container` under `key`, superseding any previous entry
    /// and demoting the coldest container when the cache overflows.
    pub fn put(&mut self, key: LogKey, container: PageContainer) -> StoreResult<()> {
        if let Some(spill) = self.spill.as_mut() {
            spill.forget(&key);
        }
        if let Some((cold_key, cold)) = self.cache.insert(key, container) {
            self.spill_mut()?.put(cold_key, &cold)?;
        }
        Ok(())
    }

    /// Looks up the container registered under `key`, promoting spill hits
    /// back into the cache tier.
    pub fn get(&mut self, key: &LogKey) -> StoreResult<Option<PageContainer>> {
        if let Some(container) = self.cache.get(key) {
            return Ok(Some(container.clone()));
        }
        let Some(spill) = self.spill.as_mut() else {
            return Ok(None);
        };
        let Some(container) = spill.take(key)? else {
            return Ok(None);
        };
        self.put(*key, container.clone())?;
        Ok(Some(container))
    }

    /// Removes and returns the container registered under `key`.
    pub fn take(&mut self, key: &LogKey) -> StoreResult<Option<PageContainer>> {
        if let Some(container) = self.cache.remove(key) {
            return Ok(Some(container));
        }
        match self.spill.as_mut() {
            Some(spill) => spill.take(key),
            None => Ok(None),
        }
    }

    /// Whether `key` is registered in either tier.
    #[must_use]
    pub fn contains(&self, key: &LogKey) -> bool {
        self.cache.contains(key) || self.spill.as_ref().is_some_and(|s| s.contains(key))
    }

    /// Keys registered in either tier, unordered.
    #[must_use]
    pub fn keys(&self) -> Vec<LogKey> {
        let mut keys = self.cache.keys();
        if let Some(spill) = &self.spill {
            keys.extend(spill.keys());
        }
        keys
    }

    /// Number of registered containers across both tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len() + self.spill.as_ref().map_or(0, SpillLog::len)
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot of the cache tier.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Discards everything: the hot tier is dropped and the spill file is
    /// deleted.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.cache.clear();
        if let Some(spill) = self.spill.take() {
            spill.destroy()?;
        }
        Ok(())
    }

    fn spill_mut(&mut self) -> StoreResult<&mut SpillLog> {
        let spill = match &mut self.spill {
            Some(spill) => spill,
            none => {
                tracing::debug!(
                    path = %self.spill_path.display(),
                    "transaction log spilling to disk"
                );
                none.insert(SpillLog::create(&self.spill_path)?)
            }
        };
        Ok(spill)
    }
}

impl Drop for TxnLog {
    fn drop(&mut self) {
        // Best effort; a leftover file is truncated by the next transaction.
        if let Some(spill) = self.spill.take() {
            let _ = spill.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use strata_common::{PageKey, Revision};
    use strata_page::{IndirectPage, LeafPage, Page, PageReference, RecordSlot};

    use super::*;

    fn container(page_key: u64, marker: String) -> PageContainer {
        let mut leaf = LeafPage::new(PageKey::new(page_key), Revision::ZERO);
        leaf.set_slot(0, RecordSlot::Value(Bytes::from(marker)));
        PageContainer::from_single(Page::Leaf(leaf))
    }

    fn log(capacity: usize, dir: &tempfile::TempDir) -> TxnLog {
        TxnLog::new(capacity, dir.path().join("overflow"))
    }

    #[test]
    fn small_logs_never_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = log(4, &dir);

        for i in 0..4 {
            log.put(LogKey::leaf(PageKey::new(i)), container(i, format!("c{i}")))
                .unwrap();
        }
        assert_eq!(log.len(), 4);
        assert!(!dir.path().join("overflow").exists());
    }

    #[test]
    fn overflow_demotes_and_promotes() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = log(2, &dir);

        for i in 0..5 {
            log.put(LogKey::leaf(PageKey::new(i)), container(i, format!("c{i}")))
                .unwrap();
        }
        assert_eq!(log.len(), 5);
        assert!(dir.path().join("overflow").exists());

        // The oldest entry was demoted to disk; reading it promotes it back.
        let key = LogKey::leaf(PageKey::new(0));
        let loaded = log.get(&key).unwrap().unwrap();
        assert_eq!(loaded, container(0, "c0".to_string()));
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn demoted_indirect_pages_keep_their_log_references() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = log(1, &dir);

        let child = LogKey::leaf(PageKey::new(9));
        let mut indirect = IndirectPage::new();
        indirect.set_reference(3, PageReference::InMemory(child));
        let key = LogKey::indirect(4, 0);
        log.put(key, PageContainer::from_single(Page::Indirect(indirect)))
            .unwrap();

        // Demote the indirect container, then read it back through the
        // spill tier.
        log.put(LogKey::leaf(PageKey::new(1)), container(1, "filler".to_string()))
            .unwrap();
        let loaded = log.get(&key).unwrap().unwrap();
        let page = loaded.complete().as_indirect().unwrap();
        assert_eq!(page.reference(3).as_log_key(), Some(child));
    }

    #[test]
    fn reput_after_demotion_keeps_one_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = log(1, &dir);

        let key = LogKey::leaf(PageKey::new(0));
        log.put(key, container(0, "old".to_string())).unwrap();
        // Demote `key` by inserting another entry.
        log.put(LogKey::leaf(PageKey::new(1)), container(1, "other".to_string()))
            .unwrap();
        // Re-register `key`; the stale spill record must not resurface.
        log.put(key, container(0, "new".to_string())).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(
            log.take(&key).unwrap().unwrap(),
            container(0, "new".to_string())
        );
        assert_eq!(log.take(&key).unwrap(), None);
    }

    #[test]
    fn take_drains_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = log(2, &dir);

        for i in 0..4 {
            log.put(LogKey::leaf(PageKey::new(i)), container(i, format!("c{i}")))
                .unwrap();
        }

        let mut keys = log.keys();
        keys.sort_unstable();
        assert_eq!(keys.len(), 4);

        for key in keys {
            assert!(log.take(&key).unwrap().is_some(), "{key}");
        }
        assert!(log.is_empty());
    }

    #[test]
    fn clear_discards_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = log(1, &dir);

        for i in 0..3 {
            log.put(LogKey::leaf(PageKey::new(i)), container(i, format!("c{i}")))
                .unwrap();
        }
        assert!(dir.path().join("overflow").exists());

        log.clear().unwrap();
        assert!(log.is_empty());
        assert!(!dir.path().join("overflow").exists());
        assert_eq!(log.get(&LogKey::leaf(PageKey::new(0))).unwrap(), None);
    }

    #[test]
    fn drop_cleans_the_spill_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overflow");
        {
            let mut log = TxnLog::new(1, path.clone());
            for i in 0..3 {
                log.put(LogKey::leaf(PageKey::new(i)), container(i, format!("c{i}")))
                    .unwrap();
            }
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
