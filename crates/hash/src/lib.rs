//! Unordered versioned hashtable index.
//!
//! Keeps two mutually consistent maps: `value -> [rid]` (the multi-valued
//! forward index) and `rid -> value` (the column's current value for each
//! RID, used to resolve `update`'s previous value without a caller-supplied
//! old value and to support point deletes). Unlike [`btree::VersionedBTree`]
//! this index carries no update history, so it can only answer
//! `point_version` for the current version (`rel_ver == 0`); older versions
//! fall through to the table's linear-scan fallback.

#[cfg(test)]
mod tests;

use common::{DbError, DbResult};
use hashbrown::HashMap;
use rid::Rid;
use std::fs;
use std::path::Path;

/// Unordered, versioned-at-present multimap: column value -> RID set, plus
/// the reverse mapping needed to find a RID's prior value on update/delete.
#[derive(Debug, Default)]
pub struct VersionedHash {
    forward: HashMap<i64, Vec<Rid>>,
    reverse: HashMap<Rid, i64>,
}

impl VersionedHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: i64, rid: Rid) {
        self.forward.entry(value).or_default().push(rid);
        self.reverse.insert(rid, value);
    }

    /// Move `rid` from `prev_value` to `new_value`. A self-update
    /// (`prev_value == new_value`) is a no-op, matching the B+-tree index.
    pub fn update(&mut self, prev_value: i64, rid: Rid, new_value: i64) {
        if prev_value == new_value {
            return;
        }
        if let Some(bucket) = self.forward.get_mut(&prev_value) {
            bucket.retain(|r| *r != rid);
            if bucket.is_empty() {
                self.forward.remove(&prev_value);
            }
        }
        self.forward.entry(new_value).or_default().push(rid);
        self.reverse.insert(rid, new_value);
    }

    pub fn delete(&mut self, value: i64, rid: Rid) {
        if let Some(bucket) = self.forward.get_mut(&value) {
            bucket.retain(|r| *r != rid);
            if bucket.is_empty() {
                self.forward.remove(&value);
            }
        }
        self.reverse.remove(&rid);
    }

    pub fn point(&self, value: i64) -> Vec<Rid> {
        self.forward.get(&value).cloned().unwrap_or_default()
    }

    pub fn range(&self, lo: i64, hi: i64) -> Vec<Rid> {
        let (lo, hi) = if hi < lo { (hi, lo) } else { (lo, hi) };
        self.forward
            .iter()
            .filter(|(k, _)| **k >= lo && **k <= hi)
            .flat_map(|(_, rids)| rids.iter().copied())
            .collect()
    }

    /// The column's current value for `rid`, if tracked.
    pub fn current_value(&self, rid: Rid) -> Option<i64> {
        self.reverse.get(&rid).copied()
    }

    pub fn save(&self, index_path: &Path, reverse_path: &Path) -> DbResult<()> {
        if let Some(parent) = index_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let forward: Vec<(i64, Vec<u64>)> = self
            .forward
            .iter()
            .map(|(k, rids)| (*k, rids.iter().map(|r| r.0).collect()))
            .collect();
        let reverse: Vec<(u64, i64)> = self.reverse.iter().map(|(r, v)| (r.0, *v)).collect();
        fs::write(
            index_path,
            serde_json::to_vec(&forward).map_err(|e| DbError::Index(format!("serialize hash index: {e}")))?,
        )?;
        fs::write(
            reverse_path,
            serde_json::to_vec(&reverse).map_err(|e| DbError::Index(format!("serialize hash reverse: {e}")))?,
        )?;
        Ok(())
    }

    pub fn load(index_path: &Path, reverse_path: &Path) -> DbResult<Self> {
        if !index_path.exists() || !reverse_path.exists() {
            return Ok(Self::new());
        }
        let forward: Vec<(i64, Vec<u64>)> = serde_json::from_slice(&fs::read(index_path)?)
            .map_err(|e| DbError::Index(format!("deserialize hash index: {e}")))?;
        let reverse: Vec<(u64, i64)> = serde_json::from_slice(&fs::read(reverse_path)?)
            .map_err(|e| DbError::Index(format!("deserialize hash reverse: {e}")))?;
        Ok(Self {
            forward: forward.into_iter().map(|(k, rids)| (k, rids.into_iter().map(Rid).collect())).collect(),
            reverse: reverse.into_iter().map(|(r, v)| (Rid(r), v)).collect(),
        })
    }
}
