use crate::transaction::Transaction;
use std::thread::{self, JoinHandle};

/// Runs a list of transactions on a dedicated thread, in order, and counts
/// how many committed.
///
/// Each worker owns its transactions outright (they are not shared across
/// workers), so no additional synchronization is needed beyond what
/// [`crate::lock_manager::LockManager`] already provides for the table
/// itself. `spawn` hands the whole batch to a background thread; `join`
/// blocks until it finishes and yields the commit count.
pub struct Worker {
    handle: Option<JoinHandle<WorkerStats>>,
}

/// What a worker observed after running its transactions to completion.
pub struct WorkerStats {
    pub outcomes: Vec<bool>,
    pub committed: usize,
}

impl Worker {
    /// Start running `transactions` sequentially on a new thread.
    pub fn spawn(mut transactions: Vec<Transaction>) -> Self {
        let handle = thread::spawn(move || {
            let outcomes: Vec<bool> = transactions.iter_mut().map(Transaction::run).collect();
            let committed = outcomes.iter().filter(|&&ok| ok).count();
            WorkerStats { outcomes, committed }
        });
        Self { handle: Some(handle) }
    }

    /// Block until the worker's thread finishes, returning its stats.
    ///
    /// # Panics
    /// Panics if called twice, or if the worker thread itself panicked.
    pub fn join(mut self) -> WorkerStats {
        self.handle
            .take()
            .expect("worker already joined")
            .join()
            .expect("worker thread panicked")
    }
}
