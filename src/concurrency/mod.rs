use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use self::lock_manager::LockMode;
use crate::buffer::page_cache::PageCache;
use crate::error::Result;

pub mod lock_manager;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique token of one transaction. Ids are never reused within a process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// The access mode a caller asks the page cache for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

impl Permissions {
    pub fn lock_mode(&self) -> LockMode {
        match self {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// A running transaction bound to the page cache it works against.
///
/// A transaction that goes out of scope without `commit` or `abort` is aborted.
pub struct Transaction<'a> {
    tid: TransactionId,
    cache: &'a PageCache,
    completed: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(cache: &'a PageCache) -> Self {
        Self {
            tid: TransactionId::new(),
            cache,
            completed: false,
        }
    }

    pub fn tid(&self) -> TransactionId {
        self.tid
    }

    pub fn cache(&self) -> &'a PageCache {
        self.cache
    }

    pub fn commit(mut self) -> Result<()> {
        self.completed = true;
        self.cache.end_transaction(self.tid, true)
    }

    pub fn abort(mut self) -> Result<()> {
        self.completed = true;
        self.cache.end_transaction(self.tid, false)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        warn!(tid = %self.tid, "transaction dropped without commit or abort, aborting");
        if let Err(e) = self.cache.end_transaction(self.tid, false) {
            warn!(tid = %self.tid, error = %e, "abort of dropped transaction failed");
        }
    }
}
