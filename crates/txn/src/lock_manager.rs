use std::sync::Mutex;

/// Non-blocking, table-granularity shared/exclusive lock.
///
/// Locking is coarser than per-record: a transaction that writes at all
/// takes the whole table exclusively, one that only reads takes it shared.
/// Both [`LockManager::request`] and [`LockManager::release`] return (or
/// act) immediately; there is no queueing or blocking wait inside the lock
/// manager itself, though a caller is free to retry a denied request.
#[derive(Debug, Default)]
pub struct LockManager {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    exclusive_held: bool,
    shared_holders: usize,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to acquire the table lock. Returns whether it was granted.
    pub fn request(&self, is_exclusive: bool) -> bool {
        let mut state = self.state.lock().expect("lock manager mutex poisoned");
        if is_exclusive {
            if state.exclusive_held || state.shared_holders > 0 {
                false
            } else {
                state.exclusive_held = true;
                true
            }
        } else if state.exclusive_held {
            false
        } else {
            state.shared_holders += 1;
            true
        }
    }

    /// Release a previously granted lock.
    pub fn release(&self, is_exclusive: bool) {
        let mut state = self.state.lock().expect("lock manager mutex poisoned");
        if is_exclusive {
            state.exclusive_held = false;
        } else {
            state.shared_holders = state.shared_holders.saturating_sub(1);
        }
    }
}
