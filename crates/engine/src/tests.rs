use super::*;
use common::{Config, IndexKind, MockClock, TailPolicy};
use std::sync::Arc;
use tempfile::tempdir;

/// Leaks the backing `TempDir` (acceptable in tests) so callers can treat
/// this like a plain constructor without threading a guard value around.
fn open_table(num_columns: usize, key_col: usize) -> Table {
    let dir = tempdir().unwrap();
    Table::open(
        dir.keep(),
        "t",
        num_columns,
        key_col,
        Config::default(),
        vec![IndexKind::BTree; num_columns],
        Arc::new(MockClock::new()),
    )
    .unwrap()
}

fn mask(num_columns: usize) -> Vec<bool> {
    vec![true; num_columns]
}

fn open_delta_table(num_columns: usize, key_col: usize) -> Table {
    let dir = tempdir().unwrap();
    let config = Config::builder().tail_policy(TailPolicy::Delta).build();
    Table::open(
        dir.keep(),
        "t",
        num_columns,
        key_col,
        config,
        vec![IndexKind::BTree; num_columns],
        Arc::new(MockClock::new()),
    )
    .unwrap()
}

#[test]
fn insert_then_select_round_trips() {
    let mut table = open_table(3, 0);
    assert!(table.insert(&[1, 10, 100]).unwrap());
    let rows = table.select(1, 0, &mask(3)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].columns, vec![Some(1), Some(10), Some(100)]);
}

#[test]
fn duplicate_primary_key_insert_fails() {
    let mut table = open_table(2, 0);
    assert!(table.insert(&[1, 10]).unwrap());
    assert!(!table.insert(&[1, 20]).unwrap());
}

#[test]
fn update_then_select_version_walks_history() {
    let mut table = open_table(2, 0);
    table.insert(&[1, 10]).unwrap();
    table.update(1, &[None, Some(20)]).unwrap();
    table.update(1, &[None, Some(30)]).unwrap();

    let current = table.select(1, 0, &mask(2)).unwrap();
    assert_eq!(current[0].columns[1], Some(30));

    let one_back = table.select_version(1, 0, &mask(2), -1).unwrap();
    assert_eq!(one_back[0].columns[1], Some(20));

    let two_back = table.select_version(1, 0, &mask(2), -2).unwrap();
    assert_eq!(two_back[0].columns[1], Some(10));

    let past_history = table.select_version(1, 0, &mask(2), -9).unwrap();
    assert_eq!(past_history[0].columns[1], Some(10));
}

#[test]
fn update_can_rename_primary_key() {
    let mut table = open_table(2, 0);
    table.insert(&[1, 10]).unwrap();
    assert!(table.update(1, &[Some(2), None]).unwrap());
    assert!(table.select(1, 0, &mask(2)).unwrap().is_empty());
    let rows = table.select(2, 0, &mask(2)).unwrap();
    assert_eq!(rows[0].columns, vec![Some(2), Some(10)]);
}

#[test]
fn update_colliding_with_existing_key_fails() {
    let mut table = open_table(2, 0);
    table.insert(&[1, 10]).unwrap();
    table.insert(&[2, 20]).unwrap();
    assert!(!table.update(1, &[Some(2), None]).unwrap());
}

#[test]
fn delete_is_idempotent_and_hides_record() {
    let mut table = open_table(2, 0);
    table.insert(&[1, 10]).unwrap();
    assert!(table.delete(1).unwrap());
    assert!(!table.delete(1).unwrap());
    assert!(table.select(1, 0, &mask(2)).unwrap().is_empty());
}

#[test]
fn sum_over_range_reflects_updates() {
    let mut table = open_table(2, 0);
    for key in 1..=5 {
        table.insert(&[key, key * 10]).unwrap();
    }
    assert_eq!(table.sum(1, 5, 1).unwrap(), 150);
    table.update(3, &[None, Some(1000)]).unwrap();
    assert_eq!(table.sum(1, 5, 1).unwrap(), 150 - 30 + 1000);
    assert_eq!(table.sum(100, 200, 1).unwrap(), 0);
}

#[test]
fn increment_bumps_a_single_column() {
    let mut table = open_table(2, 0);
    table.insert(&[1, 10]).unwrap();
    assert!(table.increment(1, 1).unwrap());
    let rows = table.select(1, 0, &mask(2)).unwrap();
    assert_eq!(rows[0].columns[1], Some(11));
}

#[test]
fn merge_preserves_current_value_visibility() {
    let mut table = open_table(2, 0);
    table.insert(&[1, 10]).unwrap();
    table.update(1, &[None, Some(20)]).unwrap();
    table.merge().unwrap();
    let rows = table.select(1, 0, &mask(2)).unwrap();
    assert_eq!(rows[0].columns[1], Some(20));
}

#[test]
fn linear_kind_column_still_answers_via_table_scan() {
    let dir = tempdir().unwrap();
    let mut table = Table::open(
        dir.keep(),
        "t",
        2,
        0,
        Config::default(),
        vec![IndexKind::BTree, IndexKind::Linear],
        Arc::new(MockClock::new()),
    )
    .unwrap();
    table.insert(&[1, 10]).unwrap();
    table.insert(&[2, 20]).unwrap();
    let rows = table.select(20, 1, &mask(2)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, 20);
    assert_eq!(rows[0].columns[0], Some(2));
}

#[test]
fn single_column_update_and_deep_version_history() {
    let mut table = open_table(5, 0);
    assert!(table.insert(&[920000, 0, 0, 0, 0]).unwrap());
    assert!(table.update(920000, &[None, Some(99), None, None, None]).unwrap());

    let current = table.select_version(920000, 0, &mask(5), 0).unwrap();
    assert_eq!(current[0].columns, vec![Some(920000), Some(99), Some(0), Some(0), Some(0)]);

    let one_back = table.select_version(920000, 0, &mask(5), -1).unwrap();
    assert_eq!(one_back[0].columns, vec![Some(920000), Some(0), Some(0), Some(0), Some(0)]);

    // history is shorter than 9 updates deep, so this falls back to the base row.
    let too_far_back = table.select_version(920000, 0, &mask(5), -9).unwrap();
    assert_eq!(too_far_back[0].columns, vec![Some(920000), Some(0), Some(0), Some(0), Some(0)]);
}

#[test]
fn renaming_the_primary_key_makes_the_old_key_invisible() {
    let mut table = open_table(5, 0);
    table.insert(&[920002, 1, 2, 3, 4]).unwrap();
    assert!(table.update(920002, &[Some(120000), Some(0), Some(0), Some(0), Some(0)]).unwrap());

    let by_new_key = table.select(120000, 0, &mask(5)).unwrap();
    assert_eq!(by_new_key[0].columns, vec![Some(120000), Some(0), Some(0), Some(0), Some(0)]);
    assert!(table.select(920002, 0, &mask(5)).unwrap().is_empty());
}

#[test]
fn delete_removes_its_contribution_from_range_sum() {
    let mut table = open_table(5, 0);
    for i in 0i64..=7 {
        table.insert(&[920000 + i, 1, 1, 1, i]).unwrap();
    }
    assert_eq!(table.sum(920000, 920007, 4).unwrap(), (0..=7).sum::<i64>());
    assert!(table.delete(920003).unwrap());
    assert_eq!(table.sum(920000, 920007, 4).unwrap(), (0..=7).sum::<i64>() - 3);
}

#[test]
fn range_sum_over_a_mix_of_untouched_rows() {
    let mut table = open_table(5, 0);
    for vals in [
        [43342, 1, 5, 0, 7],
        [45345, 1, 32, 0, 8],
        [47349, 1, 32, 0, 10],
        [41360, 1, 32, 4, 12],
        [91369, 1, 5, 4, 0],
        [41393, 1, 5, 4, 9],
        [41420, 1, 32, 0, 6],
    ] {
        assert!(table.insert(&vals).unwrap());
    }
    // keys 41360, 41393, 41420, 43342, 45345 fall in the inclusive range.
    assert_eq!(table.sum(41360, 45345, 2).unwrap(), 32 + 5 + 32 + 5 + 32);
}

#[test]
fn delta_mode_second_update_reindexes_from_the_live_chain_not_the_prior_tail() {
    let mut table = open_delta_table(2, 0);
    table.insert(&[1, 10]).unwrap();
    // tail1 updates only column 1; column 0's slot in tail1 is unwritten fill.
    table.update(1, &[None, Some(20)]).unwrap();
    // tail2 updates column 0. The old value for the key index must come from
    // the live chain (1), not from tail1's fill slot (0).
    assert!(table.update(1, &[Some(5), None]).unwrap());

    assert!(table.select(1, 0, &mask(2)).unwrap().is_empty());
    let rows = table.select(5, 0, &mask(2)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].columns, vec![Some(5), Some(20)]);
}
