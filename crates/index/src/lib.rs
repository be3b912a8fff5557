//! Per-column secondary index dispatch.
//!
//! `IndexImpl` is a fat enum over the three index variants a column can be
//! configured with at table creation (`common::IndexKind`): the versioned
//! [`btree::VersionedBTree`], the versioned [`hash::VersionedHash`], or a
//! `Linear` marker that keeps no structure at all. The selection never
//! changes after table creation, so a fixed-variant enum is adequate (no
//! need for trait-object dispatch).
//!
//! `point`/`range`/`point_version` return `Option<Vec<Rid>>`: `None` means
//! "this index cannot answer the query," signaling the caller (the table
//! engine) to fall back to its own linear scan of base pages. That fallback
//! always applies to `Linear`-kind columns and to hash-indexed columns asked
//! for a version older than the current one.


use common::{DbResult, IndexKind};
use rid::Rid;
use std::path::Path;

/// One column's secondary index, in whichever of the three shapes it was
/// configured with at table creation.
#[derive(Debug)]
pub enum IndexImpl {
    BTree(btree::VersionedBTree),
    Hash(hash::VersionedHash),
    Linear,
}

impl IndexImpl {
    pub fn new(kind: IndexKind, bplus_max_degree: usize) -> Self {
        match kind {
            IndexKind::BTree => IndexImpl::BTree(btree::VersionedBTree::new(bplus_max_degree)),
            IndexKind::Hash => IndexImpl::Hash(hash::VersionedHash::new()),
            IndexKind::Linear => IndexImpl::Linear,
        }
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            IndexImpl::BTree(_) => IndexKind::BTree,
            IndexImpl::Hash(_) => IndexKind::Hash,
            IndexImpl::Linear => IndexKind::Linear,
        }
    }

    pub fn insert(&mut self, value: i64, rid: Rid) {
        match self {
            IndexImpl::BTree(t) => t.insert(value, rid),
            IndexImpl::Hash(h) => h.insert(value, rid),
            IndexImpl::Linear => {}
        }
    }

    pub fn update(&mut self, prev_value: i64, rid: Rid, new_value: i64) {
        match self {
            IndexImpl::BTree(t) => t.update(prev_value, rid, new_value),
            IndexImpl::Hash(h) => h.update(prev_value, rid, new_value),
            IndexImpl::Linear => {}
        }
    }

    pub fn delete(&mut self, value: i64, rid: Rid) {
        match self {
            IndexImpl::BTree(t) => t.delete(value, rid),
            IndexImpl::Hash(h) => h.delete(value, rid),
            IndexImpl::Linear => {}
        }
    }

    /// RIDs whose current value is `value`, or `None` if this index cannot
    /// serve the query (always the case for `Linear`).
    pub fn point(&self, value: i64) -> Option<Vec<Rid>> {
        match self {
            IndexImpl::BTree(t) => Some(t.point(value)),
            IndexImpl::Hash(h) => Some(h.point(value)),
            IndexImpl::Linear => None,
        }
    }

    pub fn range(&self, lo: i64, hi: i64) -> Option<Vec<Rid>> {
        match self {
            IndexImpl::BTree(t) => Some(t.range(lo, hi)),
            IndexImpl::Hash(h) => Some(h.range(lo, hi)),
            IndexImpl::Linear => None,
        }
    }

    /// RIDs whose value at relative version `rel_ver` (`<= 0`) was `value`,
    /// or `None` if this index cannot serve the query: always for `Linear`,
    /// and for `Hash` whenever `rel_ver != 0` (a hashtable carries no
    /// history, only the current reverse-map value).
    pub fn point_version(&self, value: i64, rel_ver: i64) -> Option<Vec<Rid>> {
        match self {
            IndexImpl::BTree(t) => Some(t.point_version(value, rel_ver)),
            IndexImpl::Hash(h) => {
                if rel_ver == 0 {
                    Some(h.point(value))
                } else {
                    None
                }
            }
            IndexImpl::Linear => None,
        }
    }

    /// Persist this index, if its kind carries on-disk state. `dir` is the
    /// table's `index/col<C>/` directory.
    pub fn save(&self, dir: &Path) -> DbResult<()> {
        match self {
            IndexImpl::BTree(t) => t.save(&dir.join("btree_index.bin")),
            IndexImpl::Hash(h) => h.save(&dir.join("hashmap_index.json"), &dir.join("hashmap_reverse.json")),
            IndexImpl::Linear => Ok(()),
        }
    }

    pub fn load(kind: IndexKind, dir: &Path, bplus_max_degree: usize) -> DbResult<Self> {
        match kind {
            IndexKind::BTree => Ok(IndexImpl::BTree(btree::VersionedBTree::load(
                &dir.join("btree_index.bin"),
                bplus_max_degree,
            )?)),
            IndexKind::Hash => Ok(IndexImpl::Hash(hash::VersionedHash::load(
                &dir.join("hashmap_index.json"),
                &dir.join("hashmap_reverse.json"),
            )?)),
            IndexKind::Linear => Ok(IndexImpl::Linear),
        }
    }
}
