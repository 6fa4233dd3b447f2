//! Thread ownership of a store's open transaction.
//!
//! A transaction belongs to the thread that opened it. While it is open,
//! every other thread's store calls wait on the store's condvar until the
//! outermost level commits or rolls back, so a caller can never see or
//! rewind another caller's uncommitted work.

use crate::error::{StoreError, StoreResult};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
pub(crate) struct TxnOwner {
    owner: Option<ThreadId>,
    depth: usize,
}

impl TxnOwner {
    /// Whether another thread holds the open transaction.
    pub(crate) fn blocks_current(&self) -> bool {
        self.owner.is_some_and(|t| t != thread::current().id())
    }

    /// Opens one level for the current thread, returning the new depth.
    pub(crate) fn enter(&mut self) -> usize {
        self.owner = Some(thread::current().id());
        self.depth += 1;
        self.depth
    }

    /// Closes one level, returning the remaining depth. Fails unless the
    /// current thread holds the transaction.
    pub(crate) fn leave(&mut self) -> StoreResult<usize> {
        if self.depth == 0 || self.owner != Some(thread::current().id()) {
            return Err(StoreError::NoTransaction);
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.owner = None;
        }
        Ok(self.depth)
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }
}

/// Locks `mutex`, waiting on `released` while another thread's transaction
/// is open.
pub(crate) fn lock_for_caller<'a, T>(
    mutex: &'a Mutex<T>,
    released: &Condvar,
    txn: impl Fn(&T) -> &TxnOwner,
) -> StoreResult<MutexGuard<'a, T>> {
    let mut guard = mutex.lock().map_err(|_| StoreError::Lock)?;
    while txn(&guard).blocks_current() {
        guard = released.wait(guard).map_err(|_| StoreError::Lock)?;
    }
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_nest_and_release_ownership() {
        let mut txn = TxnOwner::default();
        assert_eq!(txn.enter(), 1);
        assert_eq!(txn.enter(), 2);
        assert!(!txn.blocks_current());
        assert_eq!(txn.leave().unwrap(), 1);
        assert_eq!(txn.leave().unwrap(), 0);
        assert!(matches!(txn.leave(), Err(StoreError::NoTransaction)));
    }

    #[test]
    fn other_threads_cannot_close_a_level() {
        let mut txn = TxnOwner::default();
        txn.enter();
        let (blocked, closed) = thread::scope(|s| {
            s.spawn(|| {
                let mut copy = TxnOwner {
                    owner: txn.owner,
                    depth: txn.depth,
                };
                (copy.blocks_current(), copy.leave().is_ok())
            })
            .join()
            .unwrap()
        });
        assert!(blocked);
        assert!(!closed);
        assert_eq!(txn.depth(), 1);
    }
}
