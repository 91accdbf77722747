use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::TransactionId;
use crate::common::PageId;
use crate::error::{DbError, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    /// Whether holding `self` already grants a request for `requested`.
    fn covers(&self, requested: Self) -> bool {
        match self {
            Self::Exclusive => true,
            Self::Shared => requested == LockMode::Shared,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Lock {
    tid: TransactionId,
    mode: LockMode,
}

#[derive(Default)]
struct LockTable {
    /// holders per page, each transaction appears at most once
    locks: HashMap<PageId, Vec<Lock>>,
    pages_by_tid: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    fn try_grant(&mut self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let holders = self.locks.entry(page_id).or_default();

        if let Some(position) = holders.iter().position(|lock| lock.tid == tid) {
            if holders[position].mode.covers(mode) {
                return true;
            }
            // Shared -> Exclusive upgrade, only possible for the sole holder
            if holders.len() == 1 {
                holders[position].mode = LockMode::Exclusive;
                return true;
            }
            return false;
        }

        let granted = match mode {
            LockMode::Shared => holders.iter().all(|lock| lock.mode == LockMode::Shared),
            LockMode::Exclusive => holders.is_empty(),
        };
        if granted {
            holders.push(Lock { tid, mode });
            self.pages_by_tid.entry(tid).or_default().insert(page_id);
        }
        granted
    }

    fn release(&mut self, tid: TransactionId, page_id: PageId) -> Result<()> {
        let holders = self.locks.get_mut(&page_id).ok_or_else(|| {
            DbError::Protocol(format!("Page {page_id} has no lock holders"))
        })?;
        let position = holders
            .iter()
            .position(|lock| lock.tid == tid)
            .ok_or_else(|| {
                DbError::Protocol(format!("Transaction {tid} holds no lock on page {page_id}"))
            })?;
        holders.swap_remove(position);
        if holders.is_empty() {
            self.locks.remove(&page_id);
        }
        if let Some(pages) = self.pages_by_tid.get_mut(&tid) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.pages_by_tid.remove(&tid);
            }
        }
        Ok(())
    }
}

/// LockManager grants shared and exclusive page locks under strict two-phase locking.
///
/// All bookkeeping lives behind a single mutex. Waiting transactions park on a
/// condition variable that is signalled whenever a lock is released, and give up
/// once their deadline has passed. There is no deadlock detection: a transaction
/// that cannot get its lock in time aborts itself.
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
        }
    }

    /// Grants the lock if it is compatible with the current holders. Never blocks.
    pub fn acquire(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        self.table.lock().try_grant(tid, page_id, mode)
    }

    /// Blocks until the lock is granted, or fails with `TransactionAborted`
    /// once `timeout` has elapsed.
    pub fn acquire_within(
        &self,
        tid: TransactionId,
        page_id: PageId,
        mode: LockMode,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut table = self.table.lock();
        loop {
            if table.try_grant(tid, page_id, mode) {
                debug!(tid = %tid, page = %page_id, ?mode, "lock granted");
                return Ok(());
            }
            debug!(tid = %tid, page = %page_id, ?mode, "waiting for lock");
            if self.released.wait_until(&mut table, deadline).timed_out() {
                // a release may have raced with the timeout
                if table.try_grant(tid, page_id, mode) {
                    return Ok(());
                }
                warn!(tid = %tid, page = %page_id, ?mode, ?timeout, "lock wait timed out, aborting");
                return Err(DbError::TransactionAborted { tid, page_id });
            }
        }
    }

    /// Releases the lock `tid` holds on `page_id`.
    /// Releasing a lock that is not held is a protocol violation.
    pub fn release(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        self.table.lock().release(tid, page_id)?;
        self.released.notify_all();
        Ok(())
    }

    /// Releases every lock held by `tid` and returns how many there were.
    pub fn release_all(&self, tid: TransactionId) -> usize {
        let mut table = self.table.lock();
        let pages = table.pages_by_tid.remove(&tid).unwrap_or_default();
        for page_id in &pages {
            if let Some(holders) = table.locks.get_mut(page_id) {
                holders.retain(|lock| lock.tid != tid);
                if holders.is_empty() {
                    table.locks.remove(page_id);
                }
            }
        }
        drop(table);
        if !pages.is_empty() {
            self.released.notify_all();
        }
        pages.len()
    }

    pub fn holds(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(tid, page_id).is_some()
    }

    pub fn lock_mode(&self, tid: TransactionId, page_id: PageId) -> Option<LockMode> {
        let table = self.table.lock();
        table
            .locks
            .get(&page_id)
            .and_then(|holders| holders.iter().find(|lock| lock.tid == tid))
            .map(|lock| lock.mode)
    }

    /// Pages on which `tid` currently holds a lock, in page order.
    pub fn locked_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages = table
            .pages_by_tid
            .get(&tid)
            .map(|pages| pages.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    #[cfg(test)]
    fn holder_count(&self, page_id: PageId) -> usize {
        let table = self.table.lock();
        table.locks.get(&page_id).map_or(0, |holders| holders.len())
    }
}
