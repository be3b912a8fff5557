//! Versioned B+-tree secondary index.
//!
//! An ordered multimap from a column value to a list of [`TreeEntry`]
//! records, each tagged with the absolute version at which that value was
//! observed for a RID and links to the value it came from / moved to. This
//! is what makes `point_version` possible without touching data pages: the
//! tree itself carries enough history to answer "what did RID r look like
//! k updates ago" by walking `next_ver_key` links.
//!
//! Nodes live in a flat arena (`Vec<Node>`) addressed by index rather than
//! through owning pointers, so splits and leaf-list relinking are plain
//! vector surgery instead of a graph of `Rc`/`RefCell`.

#[cfg(test)]
mod tests;

use common::{DbError, DbResult};
use rid::Rid;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

type NodeId = usize;

/// One historical observation of a RID's value in an indexed column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub rid: Rid,
    pub abs_ver: u32,
    pub prev_ver_key: Option<i64>,
    pub next_ver_key: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
enum Node {
    Internal {
        keys: Vec<i64>,
        children: Vec<NodeId>,
    },
    Leaf {
        keys: Vec<i64>,
        entries: Vec<Vec<TreeEntry>>,
        next: Option<NodeId>,
        prev: Option<NodeId>,
    },
}

/// A versioned, ordered B+-tree index keyed on a single column's value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersionedBTree {
    max_degree: usize,
    arena: Vec<Node>,
    root: NodeId,
}

impl VersionedBTree {
    pub fn new(max_degree: usize) -> Self {
        assert!(max_degree >= 3, "bplus_max_degree must be >= 3");
        Self {
            max_degree,
            arena: vec![Node::Leaf {
                keys: Vec::new(),
                entries: Vec::new(),
                next: None,
                prev: None,
            }],
            root: 0,
        }
    }

    fn max_keys(&self) -> usize {
        self.max_degree - 1
    }

    /// Descend from the root to the leaf that would hold `key`, recording
    /// the `(internal_node, child_index)` path taken so a later split can
    /// propagate splits upward without parent pointers.
    fn leaf_path(&self, key: i64) -> (NodeId, Vec<(NodeId, usize)>) {
        let mut path = Vec::new();
        let mut cur = self.root;
        loop {
            match &self.arena[cur] {
                Node::Internal { keys, children } => {
                    let idx = keys.partition_point(|&k| k <= key);
                    path.push((cur, idx));
                    cur = children[idx];
                }
                Node::Leaf { .. } => return (cur, path),
            }
        }
    }

    fn split_leaf(&mut self, leaf_id: NodeId) -> (i64, NodeId) {
        let (right_keys, right_entries, old_next) = match &mut self.arena[leaf_id] {
            Node::Leaf { keys, entries, next, .. } => {
                let mid = keys.len() / 2;
                (keys.split_off(mid), entries.split_off(mid), *next)
            }
            Node::Internal { .. } => unreachable!("split_leaf called on internal node"),
        };
        let separator = right_keys[0];
        let new_id = self.arena.len();
        self.arena.push(Node::Leaf {
            keys: right_keys,
            entries: right_entries,
            next: old_next,
            prev: Some(leaf_id),
        });
        if let Node::Leaf { next, .. } = &mut self.arena[leaf_id] {
            *next = Some(new_id);
        }
        if let Some(n) = old_next {
            if let Node::Leaf { prev, .. } = &mut self.arena[n] {
                *prev = Some(new_id);
            }
        }
        (separator, new_id)
    }

    fn split_internal(&mut self, node_id: NodeId) -> (i64, NodeId) {
        let (separator, right_keys, right_children) = match &mut self.arena[node_id] {
            Node::Internal { keys, children } => {
                let mid = keys.len() / 2;
                let separator = keys[mid];
                let right_keys = keys.split_off(mid + 1);
                keys.truncate(mid);
                let right_children = children.split_off(mid + 1);
                (separator, right_keys, right_children)
            }
            Node::Leaf { .. } => unreachable!("split_internal called on leaf"),
        };
        let new_id = self.arena.len();
        self.arena.push(Node::Internal {
            keys: right_keys,
            children: right_children,
        });
        (separator, new_id)
    }

    fn rebalance_after_insert(&mut self, mut node_id: NodeId, mut path: Vec<(NodeId, usize)>) {
        loop {
            let overflow = match &self.arena[node_id] {
                Node::Leaf { keys, .. } | Node::Internal { keys, .. } => keys.len() > self.max_keys(),
            };
            if !overflow {
                return;
            }
            let is_leaf = matches!(self.arena[node_id], Node::Leaf { .. });
            let (separator, new_right) = if is_leaf {
                self.split_leaf(node_id)
            } else {
                self.split_internal(node_id)
            };
            match path.pop() {
                Some((parent_id, child_idx)) => {
                    if let Node::Internal { keys, children } = &mut self.arena[parent_id] {
                        keys.insert(child_idx, separator);
                        children.insert(child_idx + 1, new_right);
                    }
                    node_id = parent_id;
                }
                None => {
                    let new_root = self.arena.len();
                    self.arena.push(Node::Internal {
                        keys: vec![separator],
                        children: vec![node_id, new_right],
                    });
                    self.root = new_root;
                    return;
                }
            }
        }
    }

    fn insert_entry(&mut self, key: i64, entry: TreeEntry) {
        let (leaf_id, path) = self.leaf_path(key);
        let created_new_key = match &mut self.arena[leaf_id] {
            Node::Leaf { keys, entries, .. } => match keys.binary_search(&key) {
                Ok(idx) => {
                    entries[idx].push(entry);
                    false
                }
                Err(idx) => {
                    keys.insert(idx, key);
                    entries.insert(idx, vec![entry]);
                    true
                }
            },
            Node::Internal { .. } => unreachable!(),
        };
        if created_new_key {
            self.rebalance_after_insert(leaf_id, path);
        }
    }

    /// Insert a fresh entry (`abs_ver = 0`) for `rid` under `key`.
    pub fn insert(&mut self, key: i64, rid: Rid) {
        self.insert_entry(
            key,
            TreeEntry {
                rid,
                abs_ver: 0,
                prev_ver_key: None,
                next_ver_key: None,
            },
        );
    }

    /// Record that `rid`'s indexed value moved from `prev_key` to
    /// `new_key`: closes off the latest entry at `prev_key` and opens a new
    /// one at `new_key`. A self-update (`prev_key == new_key`) is a no-op.
    pub fn update(&mut self, prev_key: i64, rid: Rid, new_key: i64) {
        if prev_key == new_key {
            return;
        }
        let abs_ver = {
            let (leaf_id, _) = self.leaf_path(prev_key);
            match &mut self.arena[leaf_id] {
                Node::Leaf { keys, entries, .. } => match keys.binary_search(&prev_key) {
                    Ok(idx) => {
                        let found = entries[idx]
                            .iter_mut()
                            .find(|e| e.rid == rid && e.next_ver_key.is_none());
                        match found {
                            Some(e) => {
                                e.next_ver_key = Some(new_key);
                                e.abs_ver
                            }
                            None => return,
                        }
                    }
                    Err(_) => return,
                },
                Node::Internal { .. } => unreachable!(),
            }
        };
        self.insert_entry(
            new_key,
            TreeEntry {
                rid,
                abs_ver: abs_ver + 1,
                prev_ver_key: Some(prev_key),
                next_ver_key: None,
            },
        );
    }

    /// Remove every historical entry for `rid`, walking the predecessor
    /// chain backward from `key` via `prev_ver_key`.
    pub fn delete(&mut self, key: i64, rid: Rid) {
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            let (leaf_id, _) = self.leaf_path(k);
            cursor = match &mut self.arena[leaf_id] {
                Node::Leaf { keys, entries, .. } => match keys.binary_search(&k) {
                    Ok(idx) => {
                        let slot = &mut entries[idx];
                        match slot.iter().position(|e| e.rid == rid) {
                            Some(pos) => slot.remove(pos).prev_ver_key,
                            None => None,
                        }
                    }
                    Err(_) => None,
                },
                Node::Internal { .. } => unreachable!(),
            };
        }
    }

    /// RIDs whose current (latest) value is `key`.
    pub fn point(&self, key: i64) -> Vec<Rid> {
        let (leaf_id, _) = self.leaf_path(key);
        match &self.arena[leaf_id] {
            Node::Leaf { keys, entries, .. } => match keys.binary_search(&key) {
                Ok(idx) => entries[idx]
                    .iter()
                    .filter(|e| e.next_ver_key.is_none())
                    .map(|e| e.rid)
                    .collect(),
                Err(_) => Vec::new(),
            },
            Node::Internal { .. } => unreachable!(),
        }
    }

    /// RIDs whose current value lies in `[lo, hi]` (inclusive; swapped if
    /// given out of order).
    pub fn range(&self, lo: i64, hi: i64) -> Vec<Rid> {
        let (lo, hi) = if hi < lo { (hi, lo) } else { (lo, hi) };
        let mut out = Vec::new();
        let (mut leaf_id, _) = self.leaf_path(lo);
        loop {
            let next = match &self.arena[leaf_id] {
                Node::Leaf { keys, entries, next, .. } => {
                    for (k, slot) in keys.iter().zip(entries.iter()) {
                        if *k >= lo && *k <= hi {
                            out.extend(slot.iter().filter(|e| e.next_ver_key.is_none()).map(|e| e.rid));
                        }
                    }
                    *next
                }
                Node::Internal { .. } => unreachable!(),
            };
            match next {
                Some(n) => {
                    let first_key_in_range = match &self.arena[n] {
                        Node::Leaf { keys, .. } => keys.first().is_some_and(|&k| k <= hi),
                        Node::Internal { .. } => false,
                    };
                    if !first_key_in_range {
                        break;
                    }
                    leaf_id = n;
                }
                None => break,
            }
        }
        out
    }

    /// Walk forward from `entry` (located under `origin_key`) through
    /// `next_ver_key` links, counting hops to the newest entry in its chain.
    fn forward_hops_from(&self, origin_key: i64, entry: &TreeEntry) -> u32 {
        let mut hops = 0u32;
        let mut cur_key = origin_key;
        let mut cur_rid = entry.rid;
        let mut cur_next = entry.next_ver_key;
        while let Some(next_key) = cur_next {
            let (leaf_id, _) = self.leaf_path(next_key);
            let found = match &self.arena[leaf_id] {
                Node::Leaf { keys, entries, .. } => keys.binary_search(&next_key).ok().and_then(|idx| {
                    entries[idx]
                        .iter()
                        .find(|e| e.rid == cur_rid && e.prev_ver_key == Some(cur_key))
                }),
                Node::Internal { .. } => unreachable!(),
            };
            match found {
                Some(e) => {
                    hops += 1;
                    cur_key = next_key;
                    cur_next = e.next_ver_key;
                }
                None => break,
            }
        }
        hops
    }

    /// RIDs whose value at relative version `rel_ver` (`<= 0`, 0 = current)
    /// was `key`.
    pub fn point_version(&self, key: i64, rel_ver: i64) -> Vec<Rid> {
        debug_assert!(rel_ver <= 0, "rel_ver must be <= 0");
        let (leaf_id, _) = self.leaf_path(key);
        let mut out = Vec::new();
        if let Node::Leaf { keys, entries, .. } = &self.arena[leaf_id] {
            if let Ok(idx) = keys.binary_search(&key) {
                for e in &entries[idx] {
                    let hops = self.forward_hops_from(key, e);
                    if -(hops as i64) == rel_ver {
                        out.push(e.rid);
                    }
                }
            }
        }
        out
    }

    pub fn save(&self, path: &Path) -> DbResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec(self).map_err(|e| DbError::Index(format!("serialize btree: {e}")))?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn load(path: &Path, max_degree: usize) -> DbResult<Self> {
        if !path.exists() {
            return Ok(Self::new(max_degree));
        }
        let data = fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| DbError::Index(format!("deserialize btree: {e}")))
    }
}
