//! Table-level transactions and concurrent workers.
//!
//! A [`Transaction`] queues [`Operation`]s and runs them atomically against
//! a shared, mutex-guarded [`engine::Table`] under a non-blocking
//! table-granularity [`LockManager`]. A [`Worker`] drives a batch of
//! transactions sequentially on its own thread, so multiple workers can run
//! concurrently against the same table, contending only at the lock
//! manager and the table's own mutex.

mod lock_manager;
mod operation;
mod transaction;
mod worker;


pub use lock_manager::LockManager;
pub use operation::{Operation, OperationResult};
pub use transaction::Transaction;
pub use worker::{Worker, WorkerStats};
