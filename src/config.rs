use std::time::Duration;

use crate::common::{DEFAULT_LOCK_TIMEOUT, DEFAULT_PAGE_SIZE, DEFAULT_POOL_SIZE};

/// Settings fixed for the lifetime of a catalog and its page cache.
///
/// `page_size` must not change once table files exist: every file is
/// interpreted as a sequence of pages of exactly this size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub page_size: usize,
    pub pool_size: usize,
    pub lock_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl Config {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}
