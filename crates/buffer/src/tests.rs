use super::*;
use common::MockClock;
use storage::{decode_i64, encode_i64};

fn dir(path: &std::path::Path, capacity: usize) -> PageDirectory {
    let files = FileManager::new(path, 4096, 8).unwrap();
    PageDirectory::new(files, capacity, Arc::new(MockClock::new()))
}

#[test]
fn get_or_create_writes_through_new_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pd = dir(tmp.path(), 2);
    pd.get_or_create(0, false, 0, 4096, 8).unwrap();
    // the page should already exist on disk even though we never saved.
    let files = FileManager::new(tmp.path(), 4096, 8).unwrap();
    assert!(files.load(0, false, 0).unwrap().is_some());
}

#[test]
fn retrieve_missing_page_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pd = dir(tmp.path(), 2);
    assert!(pd.retrieve(0, false, 0).is_err());
}

#[test]
fn eviction_flushes_dirty_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pd = dir(tmp.path(), 1);
    let p0 = pd.get_or_create(0, false, 0, 4096, 8).unwrap();
    p0.append(&encode_i64(7, 8)).unwrap();

    // Fetching a second page evicts page 0, which must flush first.
    pd.get_or_create(0, false, 1, 4096, 8).unwrap();

    let files = FileManager::new(tmp.path(), 4096, 8).unwrap();
    let reloaded = files.load(0, false, 0).unwrap().unwrap();
    assert_eq!(reloaded.num_records(), 1);
    assert_eq!(decode_i64(reloaded.read_at(0).unwrap()), 7);
}

#[test]
fn swap_replaces_cached_and_persisted_copy() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pd = dir(tmp.path(), 2);
    pd.get_or_create(0, false, 0, 4096, 8).unwrap();

    let mut replacement = storage::Page::new(4096, 8);
    replacement.append(&encode_i64(99, 8)).unwrap();
    pd.swap(0, false, 0, replacement).unwrap();

    let fetched = pd.retrieve(0, false, 0).unwrap();
    assert_eq!(decode_i64(fetched.read_at(0).unwrap()), 99);
    assert!(!fetched.is_dirty());
}

#[test]
fn save_all_flushes_every_dirty_page() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pd = dir(tmp.path(), 4);
    let p = pd.get_or_create(0, false, 0, 4096, 8).unwrap();
    p.append(&encode_i64(1, 8)).unwrap();
    pd.save_all().unwrap();

    let files = FileManager::new(tmp.path(), 4096, 8).unwrap();
    let reloaded = files.load(0, false, 0).unwrap().unwrap();
    assert_eq!(reloaded.num_records(), 1);
}
