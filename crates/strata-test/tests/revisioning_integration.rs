//! Integration tests for the revisioning strategies.
//!
//! Every strategy must reconstruct the same logical history; what differs is
//! how much of each page a commit writes. The targeted tests below pin the
//! reconstruction paths that are easy to get wrong: delta chains that end at
//! a full dump, delta chains that end at the birth of a page, and sliding
//! windows that must carry rarely written slots forward.

use std::collections::BTreeMap;

use strata_engine::{
    BackendKind, OpenOptions, Resource, ResourceConfig, Revision, RevisioningKind,
};
use strata_test::utils::{commit_records, key, memory_config, read_text, scratch_resource, value};

/// Runs a scripted history of sets and removes spread over several pages,
/// then reads every revision back and compares it against a shadow map.
fn exercise_history(kind: RevisioningKind, window: u32) {
    let config = ResourceConfig::for_testing()
        .with_revisioning(kind)
        .with_revision_window(window);
    let (_dir, session) = scratch_resource(config);

    let tracked: [u64; 6] = [0, 1, 127, 128, 300, 16_384];
    let steps: &[&[(u64, Option<&str>)]] = &[
        &[(0, Some("a0")), (1, Some("b0")), (128, Some("c0"))],
        &[(0, Some("a1")), (300, Some("d1"))],
        &[(1, None), (16_384, Some("e2"))],
        &[(1, Some("b3")), (127, Some("f3"))],
        &[(0, None), (128, Some("c4"))],
        &[(0, Some("a5"))],
        &[(300, None), (16_384, Some("e6"))],
    ];

    let mut expected: Vec<BTreeMap<u64, Option<String>>> = vec![BTreeMap::new()];
    for step in steps {
        let mut state = expected.last().expect("seeded").clone();
        let mut txn = session.begin_write().expect("writer");
        for (raw, change) in *step {
            match change {
                Some(text) => {
                    txn.set_record(key(*raw), value(text)).expect("set");
                    state.insert(*raw, Some((*text).to_string()));
                }
                None => {
                    txn.remove_record(key(*raw)).expect("remove");
                    state.insert(*raw, None);
                }
            }
        }
        txn.commit().expect("commit");
        expected.push(state);
    }

    for (revision, state) in expected.iter().enumerate() {
        let reader = session
            .begin_read(Some(Revision::new(revision as u64)))
            .expect("reader");
        for raw in tracked {
            let want = state.get(&raw).cloned().flatten();
            let got = reader
                .get_record(key(raw))
                .expect("get")
                .map(|bytes| String::from_utf8(bytes.to_vec()).expect("utf-8"));
            assert_eq!(got, want, "revision {revision}, key {raw}, strategy {kind:?}");
        }
    }
}

#[test]
fn full_round_trips_a_mixed_history() {
    exercise_history(RevisioningKind::Full, 1);
}

#[test]
fn differential_round_trips_a_mixed_history() {
    exercise_history(RevisioningKind::Differential, 3);
}

#[test]
fn incremental_round_trips_a_mixed_history() {
    exercise_history(RevisioningKind::Incremental, 4);
    exercise_history(RevisioningKind::Incremental, 2);
}

#[test]
fn sliding_snapshot_round_trips_a_mixed_history() {
    exercise_history(RevisioningKind::SlidingSnapshot, 3);
}

#[test]
fn incremental_chains_reconstruct_pages_born_off_the_boundary() {
    let config = memory_config()
        .with_revisioning(RevisioningKind::Incremental)
        .with_revision_window(4);
    let (_dir, session) = scratch_resource(config);

    // Keys 129 and 130 share a page that is first touched at revision 2 and
    // never sees the revision-4 dump; its delta chain ends at its birth.
    commit_records(&session, &[(0, "p0-1")]);
    commit_records(&session, &[(129, "n2")]);
    commit_records(&session, &[(130, "m3")]);
    commit_records(&session, &[(0, "p0-4")]);
    commit_records(&session, &[(129, "n5")]);
    commit_records(&session, &[(0, "p0-6")]);
    commit_records(&session, &[(0, "p0-7")]);
    commit_records(&session, &[(130, "m8")]);

    assert_eq!(read_text(&session, Some(Revision::new(2)), 129).as_deref(), Some("n2"));
    assert_eq!(read_text(&session, Some(Revision::new(2)), 130), None);
    assert_eq!(read_text(&session, Some(Revision::new(3)), 129).as_deref(), Some("n2"));
    assert_eq!(read_text(&session, Some(Revision::new(3)), 130).as_deref(), Some("m3"));
    assert_eq!(read_text(&session, Some(Revision::new(5)), 129).as_deref(), Some("n5"));
    assert_eq!(read_text(&session, Some(Revision::new(7)), 129).as_deref(), Some("n5"));
    assert_eq!(read_text(&session, Some(Revision::new(7)), 130).as_deref(), Some("m3"));

    // Revision 8 is a dump boundary for the reborn page.
    assert_eq!(read_text(&session, Some(Revision::new(8)), 129).as_deref(), Some("n5"));
    assert_eq!(read_text(&session, Some(Revision::new(8)), 130).as_deref(), Some("m8"));
    assert_eq!(read_text(&session, Some(Revision::new(8)), 0).as_deref(), Some("p0-7"));
}

#[test]
fn differential_deltas_accumulate_between_dumps() {
    let config = memory_config()
        .with_revisioning(RevisioningKind::Differential)
        .with_revision_window(3);
    let (_dir, session) = scratch_resource(config);

    // Alternate between two slots of one page so every intermediate revision
    // only reconstructs correctly if its delta carried the other slot along.
    commit_records(&session, &[(0, "d1")]);
    commit_records(&session, &[(1, "e2")]);
    commit_records(&session, &[(0, "d3")]);
    commit_records(&session, &[(1, "e4")]);
    commit_records(&session, &[(0, "d5")]);
    commit_records(&session, &[(1, "e6")]);

    let want: &[(u64, Option<&str>, Option<&str>)] = &[
        (1, Some("d1"), None),
        (2, Some("d1"), Some("e2")),
        (3, Some("d3"), Some("e2")),
        (4, Some("d3"), Some("e4")),
        (5, Some("d5"), Some("e4")),
        (6, Some("d5"), Some("e6")),
    ];
    for (revision, zero, one) in want {
        let at = Some(Revision::new(*revision));
        assert_eq!(read_text(&session, at, 0).as_deref(), *zero, "revision {revision}");
        assert_eq!(read_text(&session, at, 1).as_deref(), *one, "revision {revision}");
    }
}

#[test]
fn sliding_windows_keep_rarely_written_slots_reachable() {
    let config = memory_config()
        .with_revisioning(RevisioningKind::SlidingSnapshot)
        .with_revision_window(2);
    let (_dir, session) = scratch_resource(config);

    // Slot 0 is written once; slot 1 churns until the instance that wrote
    // slot 0 has long since left the reconstruction window.
    commit_records(&session, &[(0, "x"), (1, "y1")]);
    for round in 2..=6u64 {
        let text = format!("y{round}");
        commit_records(&session, &[(1, text.as_str())]);
    }

    assert_eq!(read_text(&session, None, 0).as_deref(), Some("x"));
    assert_eq!(read_text(&session, None, 1).as_deref(), Some("y6"));

    for round in 2..=5u64 {
        let at = Some(Revision::new(round));
        assert_eq!(read_text(&session, at, 0).as_deref(), Some("x"), "revision {round}");
        assert_eq!(
            read_text(&session, at, 1),
            Some(format!("y{round}")),
            "revision {round}"
        );
    }
}

#[test]
fn sliding_history_survives_reopen() {
    let config = ResourceConfig::for_testing()
        .with_backend(BackendKind::File)
        .with_revisioning(RevisioningKind::SlidingSnapshot)
        .with_revision_window(2);
    let (dir, session) = scratch_resource(config);

    commit_records(&session, &[(0, "x"), (1, "y1")]);
    for round in 2..=6u64 {
        let text = format!("y{round}");
        commit_records(&session, &[(1, text.as_str())]);
    }
    drop(session);

    let session = Resource::open(dir.path(), OpenOptions::new()).expect("reopen");
    assert_eq!(read_text(&session, None, 0).as_deref(), Some("x"));
    assert_eq!(read_text(&session, None, 1).as_deref(), Some("y6"));
    assert_eq!(read_text(&session, Some(Revision::new(3)), 1).as_deref(), Some("y3"));
}

#[test]
fn spilling_transactions_commit_cleanly() {
    let config = ResourceConfig::for_testing()
        .with_backend(BackendKind::File)
        .with_cache_capacity(2);
    let (_dir, session) = scratch_resource(config);

    // Touch 64 distinct pages in one transaction so almost all staged
    // containers overflow the in-memory tier.
    let mut txn = session.begin_write().expect("writer");
    for page in 0..64u64 {
        let text = format!("page-{page}");
        txn.set_record(key(page * 128), value(text.as_str())).expect("set");
    }
    // The first container was demoted to the spill file long ago; staged
    // reads must still see it.
    assert_eq!(
        txn.get_record(key(0)).expect("staged read"),
        Some(value("page-0"))
    );
    txn.commit().expect("commit");

    for page in 0..64u64 {
        assert_eq!(
            read_text(&session, None, page * 128),
            Some(format!("page-{page}"))
        );
    }

    // A second spilled transaction overwrites half of the pages.
    let mut txn = session.begin_write().expect("writer");
    for page in 0..32u64 {
        let text = format!("updated-{page}");
        txn.set_record(key(page * 128), value(text.as_str())).expect("set");
    }
    txn.commit().expect("commit");

    for page in 0..32u64 {
        assert_eq!(
            read_text(&session, None, page * 128),
            Some(format!("updated-{page}"))
        );
    }
    for page in 32..64u64 {
        assert_eq!(
            read_text(&session, None, page * 128),
            Some(format!("page-{page}"))
        );
    }
    assert_eq!(
        read_text(&session, Some(Revision::new(1)), 0),
        Some("page-0".to_string())
    );
}

#[test]
fn records_across_page_boundaries() {
    let (_dir, session) = scratch_resource(memory_config());

    let keys: [u64; 8] = [0, 127, 128, 255, 256, 16_383, 16_384, 2_097_151];
    let mut txn = session.begin_write().expect("writer");
    for (index, raw) in keys.iter().enumerate() {
        let text = format!("slot-{index}");
        txn.set_record(key(*raw), value(text.as_str())).expect("set");
    }
    txn.commit().expect("commit");

    let reader = session.begin_read(None).expect("reader");
    for (index, raw) in keys.iter().enumerate() {
        let got = reader
            .get_record(key(*raw))
            .expect("get")
            .map(|bytes| String::from_utf8(bytes.to_vec()).expect("utf-8"));
        assert_eq!(got, Some(format!("slot-{index}")), "key {raw}");
    }
    for raw in [1u64, 126, 129, 254, 257, 16_382, 16_385] {
        assert_eq!(reader.get_record(key(raw)).expect("get"), None, "key {raw}");
    }
    assert_eq!(reader.record_count(), keys.len() as u64);
    assert_eq!(reader.max_record_key(), Some(key(2_097_151)));
}
