use std::collections::VecDeque;
use std::sync::Arc;

use tracing::trace;

use self::heap::table::HeapFile;
use crate::buffer::page::{Page, PageRef};
use crate::buffer::page_cache::PageCache;
use crate::common::{PageId, PageNo, TableId};
use crate::concurrency::{Permissions, TransactionId};
use crate::error::Result;
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

pub mod file_manager;
pub mod heap;

/// The storage of one table. Every table kind understands the same page
/// operations, so the page cache does not need to know how a table is laid out.
pub enum PageStore {
    Heap(HeapFile),
}

impl PageStore {
    pub fn table_id(&self) -> TableId {
        match self {
            PageStore::Heap(heap) => heap.table_id(),
        }
    }

    pub fn schema(&self) -> &Schema {
        match self {
            PageStore::Heap(heap) => heap.schema(),
        }
    }

    pub fn num_pages(&self) -> PageNo {
        match self {
            PageStore::Heap(heap) => heap.num_pages(),
        }
    }

    pub fn read_page(&self, page_no: PageNo) -> Result<Page> {
        match self {
            PageStore::Heap(heap) => heap.read_page(page_no),
        }
    }

    pub fn write_page(&self, page: &Page) -> Result<()> {
        match self {
            PageStore::Heap(heap) => heap.write_page(page),
        }
    }

    pub fn insert_tuple(
        &self,
        cache: &PageCache,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        match self {
            PageStore::Heap(heap) => heap.insert_tuple(cache, tid, tuple),
        }
    }

    pub fn delete_tuple(
        &self,
        cache: &PageCache,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        match self {
            PageStore::Heap(heap) => heap.delete_tuple(cache, tid, tuple),
        }
    }

    pub fn page_tuples(&self, page: &Page) -> Result<Vec<Tuple>> {
        match self {
            PageStore::Heap(heap) => heap.page_tuples(page),
        }
    }

    /// Iterates all tuples of the table under `tid`, taking shared page locks on the way.
    pub fn iter<'a>(
        self: &Arc<Self>,
        cache: &'a PageCache,
        tid: TransactionId,
    ) -> TableIterator<'a> {
        TableIterator::new(Arc::clone(self), cache, tid)
    }
}

/// Lazily walks a table page by page, in page number then slot order.
pub struct TableIterator<'a> {
    store: Arc<PageStore>,
    cache: &'a PageCache,
    tid: TransactionId,
    next_page_no: PageNo,
    buffered: VecDeque<Tuple>,
}

impl<'a> TableIterator<'a> {
    fn new(store: Arc<PageStore>, cache: &'a PageCache, tid: TransactionId) -> Self {
        Self {
            store,
            cache,
            tid,
            next_page_no: 0,
            buffered: VecDeque::new(),
        }
    }

    fn fetch_next_tuple(&mut self) -> Result<Option<Tuple>> {
        loop {
            if let Some(tuple) = self.buffered.pop_front() {
                return Ok(Some(tuple));
            }
            // the page count is read again so that pages appended meanwhile are visited
            if self.next_page_no >= self.store.num_pages() {
                return Ok(None);
            }
            let page_id = PageId::new(self.store.table_id(), self.next_page_no);
            trace!(tid = %self.tid, page = %page_id, "table iterator advancing");
            let page = self.cache.fetch(self.tid, page_id, Permissions::ReadOnly)?;
            let tuples = self.store.page_tuples(&page.read())?;
            self.buffered.extend(tuples);
            self.next_page_no += 1;
        }
    }
}

impl Iterator for TableIterator<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch_next_tuple().transpose()
    }
}
