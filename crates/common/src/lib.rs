#[cfg(test)]
mod tests;

use rid::RidLayout;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Ordinal position of a data column within a table's `D` user columns.
pub type ColumnId = u16;

/// Canonical error type shared across the engine's subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("storage: {0}")]
    Storage(String),
    #[error("index: {0}")]
    Index(String),
    #[error("engine: {0}")]
    Engine(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias that carries a [`DbError`].
pub type DbResult<T> = Result<T, DbError>;

/// Which secondary-index implementation backs a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IndexKind {
    BTree,
    Hash,
    Linear,
}

/// Whether a table's tail records carry the full post-update row
/// (cumulative) or only the columns that changed (delta).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TailPolicy {
    Cumulative,
    Delta,
}

impl TailPolicy {
    pub fn is_cumulative(self) -> bool {
        matches!(self, TailPolicy::Cumulative)
    }
}

/// Immutable per-table configuration threaded through every constructor
/// that needs it, rather than assumed to be a set of process-wide
/// constants. The RID bit layout is derived on demand via
/// [`rid::RidLayout`] from `page_size`/`record_size` rather than cached,
/// since `Config` is cheap to clone and usually short-lived.
#[derive(Clone, Debug, bon::Builder)]
pub struct Config {
    /// Fixed-size page allocation in bytes. Must be a power of two.
    #[builder(default = 4096)]
    pub page_size: usize,
    /// Width in bytes of one column's partial record. Canonical setting is
    /// 8 (an `i64` per slot).
    #[builder(default = 8)]
    pub record_size: usize,
    /// Cumulative vs. delta tail policy, fixed for the table's lifetime.
    #[builder(default = TailPolicy::Cumulative)]
    pub tail_policy: TailPolicy,
    /// Number of pages the buffer pool keeps resident per column family.
    #[builder(default = 15)]
    pub buffer_pool_pages: usize,
    /// Max degree of B+-tree index nodes (`>= 3`).
    #[builder(default = 4)]
    pub bplus_max_degree: usize,
    /// Number of updates to a column before a merge of touched pages is
    /// scheduled.
    #[builder(default = 100)]
    pub merge_threshold: usize,
}

impl Config {
    /// The derived RID bit-width layout for this configuration.
    pub fn rid_layout(&self) -> RidLayout {
        RidLayout::new(self.page_size, self.record_size)
    }

    pub fn capacity_per_page(&self) -> usize {
        self.page_size / self.record_size
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: 4096,
            record_size: 8,
            tail_policy: TailPolicy::Cumulative,
            buffer_pool_pages: 15,
            bplus_max_degree: 4,
            merge_threshold: 100,
        }
    }
}

/// Source of table-relative timestamps (nanoseconds). Kept mockable so
/// tests can assert exact `created_time`/`updated_time` values instead of
/// racing the wall clock.
pub trait Clock: Send + Sync {
    fn now_nanos(&self) -> i64;
}

/// Wall-clock-backed [`Clock`], relative to the instant it was constructed.
#[derive(Debug)]
pub struct SystemClock {
    epoch: std::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        self.epoch.elapsed().as_nanos() as i64
    }
}

/// Deterministic [`Clock`] for tests: each call advances a shared counter
/// by a fixed step (default 1), so clones of the same `MockClock` observe
/// one monotonically increasing, reproducible sequence.
#[derive(Debug, Clone)]
pub struct MockClock {
    counter: Arc<AtomicI64>,
    step: i64,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            counter: Arc::new(AtomicI64::new(0)),
            step: 1,
        }
    }

    pub fn with_step(step: i64) -> Self {
        Self {
            counter: Arc::new(AtomicI64::new(0)),
            step,
        }
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_nanos(&self) -> i64 {
        self.counter.fetch_add(self.step, Ordering::SeqCst)
    }
}
