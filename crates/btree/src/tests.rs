use super::*;
use proptest::prelude::*;

fn r(n: u64) -> Rid {
    Rid(n)
}

#[test]
fn point_query_finds_inserted_rid() {
    let mut t = VersionedBTree::new(4);
    t.insert(10, r(1));
    t.insert(20, r(2));
    assert_eq!(t.point(10), vec![r(1)]);
    assert_eq!(t.point(20), vec![r(2)]);
    assert!(t.point(30).is_empty());
}

#[test]
fn splits_keep_all_keys_findable() {
    let mut t = VersionedBTree::new(3);
    for i in 0..50 {
        t.insert(i, r(i as u64));
    }
    for i in 0..50 {
        assert_eq!(t.point(i), vec![r(i as u64)], "key {i} missing after splits");
    }
}

#[test]
fn range_query_is_inclusive_and_sorted_order_independent() {
    let mut t = VersionedBTree::new(4);
    for i in 0..20 {
        t.insert(i, r(i as u64));
    }
    let mut got = t.range(5, 10);
    got.sort();
    assert_eq!(got, (5..=10).map(|i| r(i as u64)).collect::<Vec<_>>());

    // swapped bounds behave the same.
    let mut swapped = t.range(10, 5);
    swapped.sort();
    assert_eq!(swapped, got);
}

#[test]
fn update_moves_point_query_to_new_value() {
    let mut t = VersionedBTree::new(4);
    t.insert(100, r(1));
    t.update(100, r(1), 200);
    assert!(t.point(100).is_empty());
    assert_eq!(t.point(200), vec![r(1)]);
}

#[test]
fn self_update_is_a_no_op() {
    let mut t = VersionedBTree::new(4);
    t.insert(100, r(1));
    t.update(100, r(1), 100);
    assert_eq!(t.point(100), vec![r(1)]);
    assert_eq!(t.point_version(100, 0), vec![r(1)]);
}

#[test]
fn point_version_walks_history() {
    let mut t = VersionedBTree::new(4);
    t.insert(1, r(1)); // v0: value 1
    t.update(1, r(1), 2); // v1: value 2
    t.update(2, r(1), 3); // v2: value 3

    assert_eq!(t.point_version(3, 0), vec![r(1)]);
    assert_eq!(t.point_version(2, -1), vec![r(1)]);
    assert_eq!(t.point_version(1, -2), vec![r(1)]);
    assert!(t.point_version(1, -1).is_empty());
}

#[test]
fn delete_removes_every_historical_entry() {
    let mut t = VersionedBTree::new(4);
    t.insert(1, r(1));
    t.update(1, r(1), 2);
    t.update(2, r(1), 3);
    t.delete(3, r(1));

    assert!(t.point(3).is_empty());
    assert!(t.point_version(2, -1).is_empty());
    assert!(t.point_version(1, -2).is_empty());
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idx.json");
    let mut t = VersionedBTree::new(4);
    t.insert(1, r(1));
    t.update(1, r(1), 2);
    t.save(&path).unwrap();

    let loaded = VersionedBTree::load(&path, 4).unwrap();
    assert_eq!(loaded.point(2), vec![r(1)]);
}

#[test]
fn load_missing_file_returns_empty_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");
    let t = VersionedBTree::load(&path, 4).unwrap();
    assert!(t.point(0).is_empty());
}

proptest! {
    #[test]
    fn every_inserted_key_is_point_queryable_after_arbitrary_splits(
        keys in prop::collection::hash_set(0i64..500, 1..80),
        max_degree in 3usize..8,
    ) {
        let mut t = VersionedBTree::new(max_degree);
        for &k in &keys {
            t.insert(k, r(k as u64));
        }
        for &k in &keys {
            prop_assert_eq!(t.point(k), vec![r(k as u64)]);
        }
    }

    #[test]
    fn range_query_contains_exactly_the_keys_in_bounds(
        keys in prop::collection::hash_set(0i64..200, 1..60),
        lo in 0i64..200, hi in 0i64..200,
    ) {
        let mut t = VersionedBTree::new(4);
        for &k in &keys {
            t.insert(k, r(k as u64));
        }
        let (lo, hi) = if hi < lo { (hi, lo) } else { (lo, hi) };
        let mut got: Vec<i64> = t.range(lo, hi).into_iter().map(|rid| rid.0 as i64).collect();
        got.sort();
        let mut expected: Vec<i64> = keys.iter().copied().filter(|k| *k >= lo && *k <= hi).collect();
        expected.sort();
        prop_assert_eq!(got, expected);
    }
}
