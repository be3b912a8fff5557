use crate::{Record, Table};

/// Public-facing query surface over a single table.
///
/// Every operation maps the internal [`common::DbResult`] onto a sentinel
/// failure value instead of propagating `Err`: `false` for writes, an empty
/// `Vec` for reads, `0` for aggregates. A caller cannot distinguish "no rows
/// matched" from "the underlying storage errored," by design, matching the
/// boundary the original query layer drew between transaction-visible
/// outcomes and internal faults.
pub struct Query<'a> {
    table: &'a mut Table,
}

impl<'a> Query<'a> {
    pub fn new(table: &'a mut Table) -> Self {
        Self { table }
    }

    pub fn insert(&mut self, vals: &[i64]) -> bool {
        self.table.insert(vals).unwrap_or(false)
    }

    pub fn update(&mut self, pk: i64, vals: &[Option<i64>]) -> bool {
        self.table.update(pk, vals).unwrap_or(false)
    }

    pub fn delete(&mut self, pk: i64) -> bool {
        self.table.delete(pk).unwrap_or(false)
    }

    pub fn increment(&mut self, pk: i64, col: usize) -> bool {
        self.table.increment(pk, col).unwrap_or(false)
    }

    pub fn select(&mut self, search_key: i64, search_col: usize, mask: &[bool]) -> Vec<Record> {
        self.table.select(search_key, search_col, mask).unwrap_or_default()
    }

    pub fn select_version(&mut self, search_key: i64, search_col: usize, mask: &[bool], rel_ver: i64) -> Vec<Record> {
        self.table
            .select_version(search_key, search_col, mask, rel_ver)
            .unwrap_or_default()
    }

    pub fn sum(&mut self, lo: i64, hi: i64, col: usize) -> i64 {
        self.table.sum(lo, hi, col).unwrap_or(0)
    }

    pub fn sum_version(&mut self, lo: i64, hi: i64, col: usize, rel_ver: i64) -> i64 {
        self.table.sum_version(lo, hi, col, rel_ver).unwrap_or(0)
    }
}
