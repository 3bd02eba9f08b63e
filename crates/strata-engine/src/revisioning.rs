//! Leaf version reconstruction strategies.
//!
//! Stored leaf instances may be sparse: depending on the strategy, a commit
//! writes anything from just the touched slots up to a full dump. Reads
//! overlay gathered instances, newest first, into one complete page; writes
//! decide which slots the new instance must carry so that every slot stays
//! reachable. Both directions are pure slot arithmetic over instances the
//! transaction machinery gathered from the store.

use strata_common::{PageKey, Revision, RevisioningKind};
use strata_page::{LeafPage, Page, PageContainer};

/// Reconstruction and write policy for leaf page versions.
#[derive(Debug, Clone, Copy)]
pub struct Revisioning {
    kind: RevisioningKind,
    window: u64,
}

impl Revisioning {
    /// Creates the policy for `kind`. The window is forced to one for the
    /// full strategy, which dumps everything on every commit anyway.
    #[must_use]
    pub fn new(kind: RevisioningKind, window: u32) -> Self {
        let window = match kind {
            RevisioningKind::Full => 1,
            _ => u64::from(window),
        };
        Self { kind, window }
    }

    /// The configured reconstruction window.
    #[must_use]
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Whether an instance written at `revision` is a scheduled full dump.
    #[must_use]
    pub fn is_full_dump(&self, revision: Revision) -> bool {
        match self.kind {
            RevisioningKind::Full => true,
            RevisioningKind::Differential | RevisioningKind::Incremental => {
                revision.as_u64() % self.window == 0
            }
            RevisioningKind::SlidingSnapshot => false,
        }
    }

    /// Whether the gather walk should keep the instance found at
    /// `revision`, given how many instances were kept already.
    ///
    /// Only the differential strategy skips: it reconstructs from the
    /// newest instance plus the last full dump, so instances in between
    /// carry nothing it needs.
    #[must_use]
    pub fn wants_instance(&self, kept_so_far: usize, revision: Revision) -> bool {
        match self.kind {
            RevisioningKind::Differential => {
                kept_so_far == 0 || revision.as_u64() % self.window == 0
            }
            _ => true,
        }
    }

    /// Whether `gathered` (newest first) suffices to reconstruct the page,
    /// so the walk can stop early.
    #[must_use]
    pub fn gather_done(&self, gathered: &[LeafPage]) -> bool {
        match self.kind {
            RevisioningKind::Full => !gathered.is_empty(),
            RevisioningKind::Differential | RevisioningKind::Incremental => gathered
                .last()
                .is_some_and(|page| page.revision().as_u64() % self.window == 0),
            RevisioningKind::SlidingSnapshot => gathered.len() as u64 >= self.window,
        }
    }

    /// Overlays `gathered` (newest first) into the complete page visible at
    /// the gathering revision.
    #[must_use]
    pub fn combine_read(
        &self,
        page_key: PageKey,
        read_revision: Revision,
        gathered: &[LeafPage],
    ) -> LeafPage {
        let mut complete = match gathered.first() {
            Some(newest) => newest.clone(),
            None => LeafPage::new(page_key, read_revision),
        };
        for older in gathered.iter().skip(1) {
            complete.fill_empty_from(older);
        }
        complete
    }

    /// Builds the dirty container for a page about to be modified in
    /// `new_revision`, from the instances gathered at the base revision.
    ///
    /// The complete view is the full overlay; the modified view starts with
    /// whatever the strategy must carry and accumulates the transaction's
    /// own writes on top.
    #[must_use]
    pub fn combine_write(
        &self,
        page_key: PageKey,
        new_revision: Revision,
        gathered: &[LeafPage],
    ) -> PageContainer {
        let mut complete = self.combine_read(page_key, new_revision, gathered);
        complete.set_revision(new_revision);

        let modified = match self.kind {
            RevisioningKind::Full => complete.clone(),
            RevisioningKind::Differential => {
                if self.is_full_dump(new_revision) {
                    complete.clone()
                } else {
                    // Carry the delta accumulated since the last full dump.
                    // If the newest instance is itself a full dump, nothing
                    // accumulated yet.
                    let mut delta = LeafPage::new(page_key, new_revision);
                    if let Some(newest) = gathered.first() {
                        if !self.is_full_dump(newest.revision()) {
                            delta.fill_empty_from(newest);
                        }
                    }
                    delta
                }
            }
            RevisioningKind::Incremental => {
                if self.is_full_dump(new_revision) {
                    complete.clone()
                } else {
                    LeafPage::new(page_key, new_revision)
                }
            }
            RevisioningKind::SlidingSnapshot => {
                let mut rescued = LeafPage::new(page_key, new_revision);
                // When the window is saturated, the oldest instance slides
                // out of reach; rescue every slot only it provides.
                if gathered.len() as u64 >= self.window {
                    if let Some(oldest) = gathered.last() {
                        let newer = &gathered[..gathered.len() - 1];
                        for (slot, value) in oldest.iter() {
                            if !newer.iter().any(|page| page.is_populated(slot)) {
                                rescued.set_slot(slot, value.clone());
                            }
                        }
                    }
                }
                rescued
            }
        };

        PageContainer::new(Page::Leaf(complete), Page::Leaf(modified))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use strata_page::RecordSlot;

    use super::*;

    const PAGE: PageKey = PageKey::new(0);

    fn leaf(revision: u64, slots: &[(usize, &'static str)]) -> LeafPage {
        let mut page = LeafPage::new(PAGE, Revision::new(revision));
        for (slot, value) in slots {
            page.set_slot(*slot, RecordSlot::Value(Bytes::from_static(value.as_bytes())));
        }
        page
    }

    fn value(page: &LeafPage, slot: usize) -> Option<&RecordSlot> {
        page.slot(slot)
    }

    fn modified_leaf(container: &PageContainer) -> &LeafPage {
        container.modified().as_leaf().unwrap()
    }

    fn complete_leaf(container: &PageContainer) -> &LeafPage {
        container.complete().as_leaf().unwrap()
    }

    #[test]
    fn full_writes_everything_and_reads_one_page() {
        let policy = Revisioning::new(RevisioningKind::Full, 1);
        let base = vec![leaf(3, &[(0, "a"), (1, "b")])];

        assert!(policy.gather_done(&base));

        let container = policy.combine_write(PAGE, Revision::new(4), &base);
        assert_eq!(modified_leaf(&container).populated_count(), 2);
        assert_eq!(complete_leaf(&container), modified_leaf(&container));

        let read = policy.combine_read(PAGE, Revision::new(3), &base);
        assert!(value(&read, 0).is_some());
        assert!(value(&read, 1).is_some());
    }

    #[test]
    fn incremental_deltas_are_sparse_until_the_boundary() {
        let policy = Revisioning::new(RevisioningKind::Incremental, 4);

        // Off-boundary write carries nothing forward.
        let base = vec![leaf(5, &[(0, "a")]), leaf(4, &[(0, "old"), (1, "b")])];
        let container = policy.combine_write(PAGE, Revision::new(6), &base);
        assert_eq!(modified_leaf(&container).populated_count(), 0);
        assert_eq!(complete_leaf(&container).populated_count(), 2);

        // Boundary write dumps the whole overlay.
        let container = policy.combine_write(PAGE, Revision::new(8), &base);
        assert_eq!(modified_leaf(&container).populated_count(), 2);
    }

    #[test]
    fn incremental_read_overlays_until_full_dump() {
        let policy = Revisioning::new(RevisioningKind::Incremental, 4);

        let partial = vec![leaf(6, &[(0, "new")])];
        assert!(!policy.gather_done(&partial));

        let gathered = vec![
            leaf(6, &[(0, "new")]),
            leaf(5, &[(2, "mid")]),
            leaf(4, &[(0, "base"), (1, "kept"), (2, "older")]),
        ];
        assert!(policy.gather_done(&gathered));

        let read = policy.combine_read(PAGE, Revision::new(6), &gathered);
        assert_eq!(
            value(&read, 0),
            Some(&RecordSlot::Value(Bytes::from_static(b"new")))
        );
        assert_eq!(
            value(&read, 1),
            Some(&RecordSlot::Value(Bytes::from_static(b"kept")))
        );
        assert_eq!(
            value(&read, 2),
            Some(&RecordSlot::Value(Bytes::from_static(b"mid")))
        );
    }

    #[test]
    fn differential_wants_only_newest_and_full_dump() {
        let policy = Revisioning::new(RevisioningKind::Differential, 4);

        assert!(policy.wants_instance(0, Revision::new(7)));
        assert!(!policy.wants_instance(1, Revision::new(6)));
        assert!(policy.wants_instance(1, Revision::new(4)));
    }

    #[test]
    fn differential_accumulates_the_delta() {
        let policy = Revisioning::new(RevisioningKind::Differential, 4);

        // Newest instance is a delta: the next delta carries its slots.
        let gathered = vec![
            leaf(6, &[(0, "changed"), (3, "also")]),
            leaf(4, &[(0, "base"), (1, "kept")]),
        ];
        let container = policy.combine_write(PAGE, Revision::new(7), &gathered);
        let modified = modified_leaf(&container);
        assert!(modified.is_populated(0));
        assert!(modified.is_populated(3));
        assert!(!modified.is_populated(1));
        assert_eq!(complete_leaf(&container).populated_count(), 3);

        // After a full dump, the delta starts empty again.
        let gathered = vec![leaf(4, &[(0, "base"), (1, "kept")])];
        let container = policy.combine_write(PAGE, Revision::new(5), &gathered);
        assert_eq!(modified_leaf(&container).populated_count(), 0);

        // The boundary write dumps everything.
        let container = policy.combine_write(PAGE, Revision::new(8), &gathered);
        assert_eq!(modified_leaf(&container).populated_count(), 2);
    }

    #[test]
    fn sliding_rescues_slots_of_the_expiring_instance() {
        let policy = Revisioning::new(RevisioningKind::SlidingSnapshot, 3);

        // Window saturated: slot 2 is provided only by the oldest instance.
        let gathered = vec![
            leaf(6, &[(0, "new")]),
            leaf(5, &[(1, "mid")]),
            leaf(4, &[(0, "shadowed"), (2, "expiring")]),
        ];
        assert!(policy.gather_done(&gathered));

        let container = policy.combine_write(PAGE, Revision::new(7), &gathered);
        let modified = modified_leaf(&container);
        assert_eq!(
            value(modified, 2),
            Some(&RecordSlot::Value(Bytes::from_static(b"expiring")))
        );
        assert!(!modified.is_populated(0));
        assert!(!modified.is_populated(1));
    }

    #[test]
    fn sliding_rescues_nothing_below_saturation() {
        let policy = Revisioning::new(RevisioningKind::SlidingSnapshot, 3);

        let gathered = vec![leaf(2, &[(0, "a")]), leaf(1, &[(1, "b")])];
        assert!(!policy.gather_done(&gathered));

        let container = policy.combine_write(PAGE, Revision::new(3), &gathered);
        assert_eq!(modified_leaf(&container).populated_count(), 0);
        assert_eq!(complete_leaf(&container).populated_count(), 2);
    }

    #[test]
    fn tombstones_overlay_like_values() {
        let policy = Revisioning::new(RevisioningKind::Incremental, 4);

        let mut newest = leaf(5, &[]);
        newest.set_slot(0, RecordSlot::Tombstone);
        let gathered = vec![newest, leaf(4, &[(0, "buried"), (1, "kept")])];

        let read = policy.combine_read(PAGE, Revision::new(5), &gathered);
        assert_eq!(value(&read, 0), Some(&RecordSlot::Tombstone));
        assert!(read.is_populated(1));
    }

    #[test]
    fn first_touch_of_a_page_starts_empty() {
        for kind in [
            RevisioningKind::Full,
            RevisioningKind::Differential,
            RevisioningKind::Incremental,
            RevisioningKind::SlidingSnapshot,
        ] {
            let policy = Revisioning::new(kind, 4);
            let container = policy.combine_write(PAGE, Revision::new(1), &[]);
            assert_eq!(complete_leaf(&container).populated_count(), 0, "{kind:?}");
            assert_eq!(modified_leaf(&container).populated_count(), 0, "{kind:?}");
        }
    }
}
