use engine::Record;

/// One step of a transaction, queued against a single table.
///
/// Mirrors `engine::Query`'s surface one-to-one; a transaction is just an
/// ordered list of these plus the table-lock bookkeeping around running
/// them. `Insert`/`Update`/`Delete`/`Increment` are write operations: a
/// `false` result aborts the whole transaction. `Select`/`SelectVersion`/
/// `Sum`/`SumVersion` are read-only and never trigger an abort, matching
/// the sentinel convention `engine::Query` already applies (an empty
/// result or a zero is indistinguishable from "found nothing," not a
/// transaction-ending failure).
#[derive(Clone, Debug)]
pub enum Operation {
    Insert(Vec<i64>),
    Update(i64, Vec<Option<i64>>),
    Delete(i64),
    Increment(i64, usize),
    Select { search_key: i64, search_col: usize, mask: Vec<bool> },
    SelectVersion { search_key: i64, search_col: usize, mask: Vec<bool>, rel_ver: i64 },
    Sum { lo: i64, hi: i64, col: usize },
    SumVersion { lo: i64, hi: i64, col: usize, rel_ver: i64 },
}

impl Operation {
    /// Write operations require the table's exclusive lock; reads are
    /// satisfied by a shared lock.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Operation::Insert(_) | Operation::Update(..) | Operation::Delete(_) | Operation::Increment(..)
        )
    }
}

/// The outcome of running one [`Operation`].
#[derive(Clone, Debug)]
pub enum OperationResult {
    Bool(bool),
    Records(Vec<Record>),
    Sum(i64),
}

impl OperationResult {
    /// `false` only for a failed write operation; every other outcome
    /// (including an empty read) is treated as non-aborting.
    pub fn is_abort(&self) -> bool {
        matches!(self, OperationResult::Bool(false))
    }
}
