use super::*;

fn r(n: u64) -> Rid {
    Rid(n)
}

#[test]
fn point_and_range() {
    let mut h = VersionedHash::new();
    h.insert(1, r(1));
    h.insert(5, r(2));
    h.insert(5, r(3));
    assert_eq!(h.point(1), vec![r(1)]);
    let mut bucket = h.point(5);
    bucket.sort();
    assert_eq!(bucket, vec![r(2), r(3)]);

    let mut ranged = h.range(0, 5);
    ranged.sort();
    assert_eq!(ranged, vec![r(1), r(2), r(3)]);
}

#[test]
fn update_moves_bucket_and_reverse_map() {
    let mut h = VersionedHash::new();
    h.insert(10, r(1));
    h.update(10, r(1), 20);
    assert!(h.point(10).is_empty());
    assert_eq!(h.point(20), vec![r(1)]);
    assert_eq!(h.current_value(r(1)), Some(20));
}

#[test]
fn self_update_is_a_no_op() {
    let mut h = VersionedHash::new();
    h.insert(10, r(1));
    h.update(10, r(1), 10);
    assert_eq!(h.point(10), vec![r(1)]);
}

#[test]
fn delete_clears_both_maps() {
    let mut h = VersionedHash::new();
    h.insert(10, r(1));
    h.delete(10, r(1));
    assert!(h.point(10).is_empty());
    assert_eq!(h.current_value(r(1)), None);
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let idx_path = dir.path().join("hashmap_index.json");
    let rev_path = dir.path().join("hashmap_reverse.json");

    let mut h = VersionedHash::new();
    h.insert(1, r(1));
    h.insert(1, r(2));
    h.save(&idx_path, &rev_path).unwrap();

    let loaded = VersionedHash::load(&idx_path, &rev_path).unwrap();
    let mut bucket = loaded.point(1);
    bucket.sort();
    assert_eq!(bucket, vec![r(1), r(2)]);
    assert_eq!(loaded.current_value(r(1)), Some(1));
}

#[test]
fn load_missing_files_returns_empty_index() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = VersionedHash::load(&dir.path().join("a.json"), &dir.path().join("b.json")).unwrap();
    assert!(loaded.point(0).is_empty());
}
