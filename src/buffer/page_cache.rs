use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::page::PageRef;
use crate::catalog::Catalog;
use crate::common::{PageId, TableId};
use crate::concurrency::lock_manager::LockManager;
use crate::concurrency::{Permissions, TransactionId};
use crate::config::Config;
use crate::error::{DbError, Result};
use crate::tuple::Tuple;

type PageMap = LruCache<PageId, PageRef>;

/// PageCache holds a bounded number of pages in memory and is the only way to
/// reach table pages.
///
/// Every access first takes a page lock through the lock manager. Pages are
/// never written to disk before the transaction that dirtied them commits
/// (no steal), and all of them are written when it does (force). An abort
/// therefore only has to read the dirtied pages back from disk.
///
/// Lock order: the cache mutex may be taken before a page content lock, never
/// the other way around.
pub struct PageCache {
    capacity: usize,
    /// created unbounded, `capacity` is enforced by `evict` so that a dirty
    /// page is never pushed out silently
    pages: Mutex<PageMap>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    lock_timeout: Duration,
}

impl PageCache {
    /// Fails if `config` asks for a cache without room for a single page.
    pub fn new(catalog: Arc<Catalog>, config: &Config) -> Result<Self> {
        if config.pool_size == 0 {
            return Err(DbError::Storage("Pool size must not be zero".to_owned()));
        }
        Ok(Self {
            capacity: config.pool_size,
            pages: Mutex::new(LruCache::unbounded()),
            lock_manager: LockManager::new(),
            catalog,
            lock_timeout: config.lock_timeout,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.pages.lock().contains(&page_id)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    /// Returns the page after locking it for `tid` with the lock mode that
    /// matches `permissions`. Fails with `TransactionAborted` if the lock is not
    /// granted within the lock timeout.
    pub fn fetch(
        &self,
        tid: TransactionId,
        page_id: PageId,
        permissions: Permissions,
    ) -> Result<PageRef> {
        self.lock_manager.acquire_within(
            tid,
            page_id,
            permissions.lock_mode(),
            self.lock_timeout,
        )?;

        let cached = self.pages.lock().get(&page_id).cloned();
        if let Some(page) = cached {
            return Ok(page);
        }

        // read without holding the cache mutex, the page lock keeps writers away
        let store = self.catalog.get_store(page_id.table_id)?;
        let page = store.read_page(page_id.page_no)?.into_ref();
        debug!(tid = %tid, page = %page_id, "page fault");

        let mut pages = self.pages.lock();
        // a concurrent reader may have loaded the same page meanwhile
        if let Some(cached) = pages.get(&page_id) {
            return Ok(Arc::clone(cached));
        }
        if pages.len() >= self.capacity {
            self.evict_locked(&mut pages)?;
        }
        pages.put(page_id, Arc::clone(&page));

        Ok(page)
    }

    /// Inserts `tuple` into table `table_id` and caches the touched pages as
    /// dirtied by `tid`. The tuple receives its record id.
    pub fn apply_insert(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        let store = self.catalog.get_store(table_id)?;
        let pages = store.insert_tuple(self, tid, tuple)?;
        self.cache_dirty_pages(tid, &pages)?;
        Ok(pages)
    }

    /// Deletes `tuple` from the table its record id points into and caches the
    /// touched pages as dirtied by `tid`.
    pub fn apply_delete(&self, tid: TransactionId, tuple: &Tuple) -> Result<Vec<PageRef>> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| DbError::Storage("Tuple has no record id".to_owned()))?;
        let store = self.catalog.get_store(record_id.page_id.table_id)?;
        let pages = store.delete_tuple(self, tid, tuple)?;
        self.cache_dirty_pages(tid, &pages)?;
        Ok(pages)
    }

    fn cache_dirty_pages(&self, tid: TransactionId, dirty_pages: &[PageRef]) -> Result<()> {
        for page in dirty_pages {
            let page_id = {
                let mut page_guard = page.write();
                page_guard.mark_dirty(Some(tid));
                page_guard.id()
            };

            let mut pages = self.pages.lock();
            let cached_same = pages.get(&page_id).map(|cached| Arc::ptr_eq(cached, page));
            match cached_same {
                Some(true) => {}
                // replace a stale copy
                Some(false) => {
                    pages.put(page_id, Arc::clone(page));
                }
                None => {
                    if pages.len() >= self.capacity {
                        self.evict_locked(&mut pages)?;
                    }
                    pages.put(page_id, Arc::clone(page));
                }
            }
        }
        Ok(())
    }

    pub fn release(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        self.lock_manager.release(tid, page_id)
    }

    pub fn holds(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds(tid, page_id)
    }

    /// Ends `tid`. On commit every page it dirtied is written to disk, on abort
    /// every such page is read back from disk. The cached pages keep their
    /// identity, only their content changes. Locks are released in both cases,
    /// even if writing or reading a page failed; the first such error is returned.
    pub fn end_transaction(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let dirty_pages = self.dirty_pages(|dirtied_by| dirtied_by == Some(tid));

        let mut first_error = None;
        for page in &dirty_pages {
            let result = if commit {
                self.write_back(page)
            } else {
                self.restore(page)
            };
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        let released = self.lock_manager.release_all(tid);
        info!(
            tid = %tid,
            commit,
            pages = dirty_pages.len(),
            locks = released,
            "transaction ended"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Removes one clean page from the cache, least recently used first.
    /// Fails with `CapacityExceeded` if every cached page is dirty.
    pub fn evict(&self) -> Result<()> {
        let mut pages = self.pages.lock();
        self.evict_locked(&mut pages)
    }

    fn evict_locked(&self, pages: &mut MutexGuard<PageMap>) -> Result<()> {
        // a page whose content is being written right now is not a candidate
        let victim = pages
            .iter()
            .rev()
            .find(|(_, page)| page.try_read().map_or(false, |page| !page.is_dirty()))
            .map(|(page_id, _)| *page_id);

        match victim {
            Some(page_id) => {
                pages.pop(&page_id);
                debug!(page = %page_id, "evicted page");
                Ok(())
            }
            None => Err(DbError::CapacityExceeded {
                capacity: self.capacity,
            }),
        }
    }

    /// Drops a page from the cache without writing it, dirty or not.
    pub fn discard(&self, page_id: PageId) {
        if self.pages.lock().pop(&page_id).is_some() {
            debug!(page = %page_id, "discarded page");
        }
    }

    /// Writes a cached page to disk if it is dirty and clears its dirty marker.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let page = self.pages.lock().peek(&page_id).cloned();
        match page {
            Some(page) => self.write_back(&page),
            None => Ok(()),
        }
    }

    /// Writes every page dirtied by `tid`.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        for page in self.dirty_pages(|dirtied_by| dirtied_by == Some(tid)) {
            self.write_back(&page)?;
        }
        Ok(())
    }

    /// Writes every dirty page, including uncommitted ones. This gives up the
    /// no-steal guarantee and is only meant for shutdown and tests.
    pub fn flush_all_pages(&self) -> Result<()> {
        for page in self.dirty_pages(|dirtied_by| dirtied_by.is_some()) {
            self.write_back(&page)?;
        }
        Ok(())
    }

    fn dirty_pages(&self, filter: impl Fn(Option<TransactionId>) -> bool) -> Vec<PageRef> {
        let cached = self
            .pages
            .lock()
            .iter()
            .map(|(_, page)| Arc::clone(page))
            .collect::<Vec<_>>();
        // content locks are only taken once the cache mutex is released
        cached
            .into_iter()
            .filter(|page| filter(page.read().dirtied_by()))
            .collect()
    }

    fn write_back(&self, page: &PageRef) -> Result<()> {
        let mut page_guard = page.write();
        if !page_guard.is_dirty() {
            return Ok(());
        }
        let page_id = page_guard.id();
        let store = self.catalog.get_store(page_id.table_id)?;
        store.write_page(&page_guard)?;
        page_guard.mark_dirty(None);
        debug!(page = %page_id, "flushed page");
        Ok(())
    }

    fn restore(&self, page: &PageRef) -> Result<()> {
        let mut page_guard = page.write();
        let page_id = page_guard.id();
        let store = self.catalog.get_store(page_id.table_id)?;
        let on_disk = store.read_page(page_id.page_no)?;
        page_guard.restore(on_disk.data());
        debug!(page = %page_id, "restored page from disk");
        Ok(())
    }
}
