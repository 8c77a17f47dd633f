//! B-tree integration: range correctness after interleaved inserts, and
//! structural validity across deletes and reopens.

use std::sync::Arc;

use rookdb::btree::{BtreeIndex, IndexKey, RangeBound};
use rookdb::storage::PageManager;
use rookdb::value::TupleId;
use tempfile::TempDir;

const PAGE: usize = 1024;

fn open_index(dir: &TempDir, unique: bool) -> BtreeIndex {
    let pager = Arc::new(PageManager::new(dir.path(), PAGE).unwrap());
    BtreeIndex::open(pager, "table", "index", unique).unwrap()
}

fn tid(n: i64) -> TupleId {
    TupleId::new(n as u32 + 1, 0)
}

#[test]
fn range_scan_matches_reference_after_interleaved_inserts() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir, false);

    // A pseudo-random permutation of 0..500.
    let keys: Vec<i64> = (0..500).map(|i| (i * 211) % 500).collect();
    for &k in &keys {
        index.insert(IndexKey::Int(k), tid(k)).unwrap();
    }
    index.verify().unwrap();

    // range_scan([min, max]) yields exactly the ids whose keys fall in
    // the interval, in non-decreasing key order.
    for (min, max) in [(0i64, 499i64), (100, 200), (250, 251), (499, 499)] {
        let lower = IndexKey::Int(min);
        let upper = IndexKey::Int(max);
        let got = index
            .range_scan(RangeBound::Inclusive(&lower), RangeBound::Inclusive(&upper))
            .unwrap();
        let expected: Vec<TupleId> = (min..=max).map(tid).collect();
        assert_eq!(got, expected, "range [{min}, {max}]");
    }

    // Empty interval.
    let lower = IndexKey::Int(300);
    let upper = IndexKey::Int(299);
    assert!(index
        .range_scan(RangeBound::Inclusive(&lower), RangeBound::Inclusive(&upper))
        .unwrap()
        .is_empty());

    let stats = index.stats().unwrap();
    assert_eq!(stats.num_entries, 500);
    assert!(stats.depth >= 2);
}

#[test]
fn point_lookups_after_heavy_splits() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir, false);

    for k in (0..400).rev() {
        index.insert(IndexKey::Int(k), tid(k)).unwrap();
    }
    index.verify().unwrap();
    for k in 0..400 {
        assert_eq!(index.search(&IndexKey::Int(k)).unwrap(), vec![tid(k)]);
    }
    assert!(index.search(&IndexKey::Int(400)).unwrap().is_empty());
}

#[test]
fn deletes_leave_a_valid_tree() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir, false);

    for k in 0..300 {
        index.insert(IndexKey::Int(k), tid(k)).unwrap();
    }
    // Delete every third entry; no rebalancing happens, but the tree must
    // verify and the survivors must stay findable.
    for k in (0..300).step_by(3) {
        assert!(index.delete(&IndexKey::Int(k), tid(k)).unwrap());
    }
    index.verify().unwrap();

    for k in 0..300 {
        let found = index.search(&IndexKey::Int(k)).unwrap();
        if k % 3 == 0 {
            assert!(found.is_empty(), "key {k} should be gone");
        } else {
            assert_eq!(found, vec![tid(k)], "key {k} should remain");
        }
    }
}

#[test]
fn duplicates_scan_in_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir, false);

    // Enough duplicates of one key to cross page boundaries.
    for n in 0..100 {
        index.insert(IndexKey::Int(7), tid(n)).unwrap();
    }
    index.insert(IndexKey::Int(3), tid(1000)).unwrap();
    index.insert(IndexKey::Int(9), tid(2000)).unwrap();
    index.verify().unwrap();

    let found = index.search(&IndexKey::Int(7)).unwrap();
    assert_eq!(found, (0..100).map(tid).collect::<Vec<_>>());
}

#[test]
fn text_keys_range_scan() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir, false);

    let words = [
        "apple", "banana", "cherry", "date", "elderberry", "fig", "grape",
    ];
    for (n, word) in words.iter().enumerate() {
        index
            .insert(IndexKey::Text((*word).into()), tid(n as i64))
            .unwrap();
    }

    let lower = IndexKey::Text("banana".into());
    let upper = IndexKey::Text("fig".into());
    let got = index
        .range_scan(RangeBound::Inclusive(&lower), RangeBound::Exclusive(&upper))
        .unwrap();
    // banana, cherry, date, elderberry.
    assert_eq!(got, vec![tid(1), tid(2), tid(3), tid(4)]);
}

#[test]
fn index_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let index = open_index(&dir, true);
        for k in 0..150 {
            index.insert(IndexKey::Int(k), tid(k)).unwrap();
        }
    }

    let index = open_index(&dir, true);
    index.verify().unwrap();
    assert_eq!(index.stats().unwrap().num_entries, 150);
    assert_eq!(index.search(&IndexKey::Int(77)).unwrap(), vec![tid(77)]);

    // Uniqueness survives the reopen too.
    assert!(index.insert(IndexKey::Int(77), tid(9999)).is_err());
}
