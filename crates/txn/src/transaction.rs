use crate::lock_manager::LockManager;
use crate::operation::{Operation, OperationResult};
use engine::{Query, Table};
use std::sync::{Arc, Mutex};

/// Upper bound on non-blocking lock attempts before a transaction gives up.
/// The lock manager itself never blocks or queues (spec.md §4.7); retrying
/// is left to the transaction layer's discretion (spec.md §5), and a held
/// lock is normally released within microseconds by whichever other
/// transaction holds it, so this bound exists only to keep a lock that is
/// never released (not just briefly held) from spinning forever.
const MAX_LOCK_ATTEMPTS: usize = 10_000;

/// An ordered batch of operations run atomically against one table under
/// its table-level lock.
///
/// `is_exclusive` is derived automatically as operations are queued: a
/// single write anywhere in the batch makes the whole transaction take the
/// table's exclusive lock, since locking is table- not record-granular.
/// [`Transaction::run`] retries the non-blocking lock request, yielding
/// between attempts, until it is granted or `MAX_LOCK_ATTEMPTS` is reached;
/// exhausting the retries aborts immediately (nothing has executed yet, so
/// there is nothing to roll back). Once acquired, operations run in order
/// and the first write that reports `false` aborts the rest of the batch.
pub struct Transaction {
    table: Arc<Mutex<Table>>,
    lock_manager: Arc<LockManager>,
    operations: Vec<Operation>,
    is_exclusive: bool,
    results: Vec<OperationResult>,
}

impl Transaction {
    pub fn new(table: Arc<Mutex<Table>>, lock_manager: Arc<LockManager>) -> Self {
        Self {
            table,
            lock_manager,
            operations: Vec::new(),
            is_exclusive: false,
            results: Vec::new(),
        }
    }

    pub fn add_query(&mut self, op: Operation) {
        if op.is_write() {
            self.is_exclusive = true;
        }
        self.operations.push(op);
    }

    pub fn results(&self) -> &[OperationResult] {
        &self.results
    }

    /// Run every queued operation. Returns `true` if the transaction
    /// committed, `false` if it aborted (lock denied after retrying, or a
    /// write failed).
    pub fn run(&mut self) -> bool {
        if !self.acquire_lock() {
            return self.abort_without_releasing();
        }

        let mut table = self.table.lock().expect("table mutex poisoned");
        let mut query = Query::new(&mut table);
        for op in &self.operations {
            let result = Self::execute(&mut query, op);
            let should_abort = result.is_abort();
            self.results.push(result);
            if should_abort {
                drop(query);
                drop(table);
                return self.abort();
            }
        }
        drop(query);
        drop(table);
        self.commit()
    }

    fn execute(query: &mut Query<'_>, op: &Operation) -> OperationResult {
        match op {
            Operation::Insert(vals) => OperationResult::Bool(query.insert(vals)),
            Operation::Update(pk, vals) => OperationResult::Bool(query.update(*pk, vals)),
            Operation::Delete(pk) => OperationResult::Bool(query.delete(*pk)),
            Operation::Increment(pk, col) => OperationResult::Bool(query.increment(*pk, *col)),
            Operation::Select { search_key, search_col, mask } => {
                OperationResult::Records(query.select(*search_key, *search_col, mask))
            }
            Operation::SelectVersion { search_key, search_col, mask, rel_ver } => {
                OperationResult::Records(query.select_version(*search_key, *search_col, mask, *rel_ver))
            }
            Operation::Sum { lo, hi, col } => OperationResult::Sum(query.sum(*lo, *hi, *col)),
            Operation::SumVersion { lo, hi, col, rel_ver } => {
                OperationResult::Sum(query.sum_version(*lo, *hi, *col, *rel_ver))
            }
        }
    }

    /// Re-request the table lock until it is granted or `MAX_LOCK_ATTEMPTS`
    /// non-blocking attempts have been spent, yielding the thread between
    /// attempts so a genuinely contending holder gets a chance to finish
    /// and release.
    fn acquire_lock(&self) -> bool {
        for attempt in 0..MAX_LOCK_ATTEMPTS {
            if self.lock_manager.request(self.is_exclusive) {
                return true;
            }
            if attempt + 1 < MAX_LOCK_ATTEMPTS {
                std::thread::yield_now();
            }
        }
        false
    }

    fn abort_without_releasing(&mut self) -> bool {
        false
    }

    fn abort(&mut self) -> bool {
        self.lock_manager.release(self.is_exclusive);
        false
    }

    fn commit(&mut self) -> bool {
        self.lock_manager.release(self.is_exclusive);
        true
    }
}
