use parking_lot::Mutex;
use tracing::debug;

use super::page::HeapLayout;
use crate::buffer::page::{Page, PageRef};
use crate::buffer::page_cache::PageCache;
use crate::common::{PageId, PageNo, RecordId, TableId};
use crate::concurrency::{Permissions, TransactionId};
use crate::error::{DbError, Result};
use crate::storage::file_manager::PageFile;
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

/// A table stored as an unordered collection of fixed-size tuples.
pub struct HeapFile {
    table_id: TableId,
    file: PageFile,
    schema: Schema,
    layout: HeapLayout,
    /// serializes appending new pages to the file
    grow: Mutex<()>,
}

impl HeapFile {
    pub fn new(table_id: TableId, file: PageFile, schema: Schema) -> Result<Self> {
        let layout = HeapLayout::new(&schema, file.page_size())?;
        Ok(Self {
            table_id,
            file,
            schema,
            layout,
            grow: Mutex::new(()),
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn layout(&self) -> &HeapLayout {
        &self.layout
    }

    pub fn num_pages(&self) -> PageNo {
        self.file.num_pages()
    }

    pub fn read_page(&self, page_no: PageNo) -> Result<Page> {
        let data = self.file.read_page(page_no)?;
        Ok(Page::new(PageId::new(self.table_id, page_no), data))
    }

    pub fn write_page(&self, page: &Page) -> Result<()> {
        self.check_table(page.id())?;
        self.file.write_page(page.id().page_no, page.data())
    }

    /// Appends an empty page and returns its number.
    pub fn append_empty_page(&self) -> Result<PageNo> {
        let page_no = self.file.append_page(&vec![0u8; self.file.page_size()])?;
        debug!(table = self.table_id, page_no, "appended empty page");
        Ok(page_no)
    }

    /// Tuples stored in `page`, in slot order.
    pub fn page_tuples(&self, page: &Page) -> Result<Vec<Tuple>> {
        self.layout.tuples(page.data(), &self.schema, page.id())
    }

    /// Inserts `tuple` into the first page with a free slot, appending a page
    /// if every page is full. On success the tuple carries its new record id and
    /// the touched page is returned, marked dirty by `tid`.
    ///
    /// Every page looked at stays locked until `tid` ends, full ones included.
    pub fn insert_tuple(
        &self,
        cache: &PageCache,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        self.schema.validate(tuple.values())?;

        let mut page_no = 0;
        loop {
            let num_pages = self.num_pages();
            while page_no < num_pages {
                let page_id = PageId::new(self.table_id, page_no);
                let page = cache.fetch(tid, page_id, Permissions::ReadWrite)?;

                let slot = {
                    let mut page_guard = page.write();
                    let slot = self.layout.insert(page_guard.data_mut(), tuple.values());
                    if slot.is_some() {
                        page_guard.mark_dirty(Some(tid));
                    }
                    slot
                };
                if let Some(slot) = slot {
                    tuple.set_record_id(Some(RecordId::new(page_id, slot)));
                    return Ok(vec![page]);
                }

                page_no += 1;
            }

            let _grow_guard = self.grow.lock();
            // another transaction appended while we were scanning, look at its page first
            if self.num_pages() == num_pages {
                self.append_empty_page()?;
            }
        }
    }

    /// Frees the slot named by the tuple's record id and returns the touched page.
    pub fn delete_tuple(
        &self,
        cache: &PageCache,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| DbError::Storage("Tuple has no record id".to_owned()))?;
        self.check_table(record_id.page_id)?;
        if record_id.page_id.page_no >= self.num_pages() {
            return Err(DbError::Storage(format!(
                "Record {record_id} points behind the last page"
            )));
        }

        let page = cache.fetch(tid, record_id.page_id, Permissions::ReadWrite)?;
        {
            let mut page_guard = page.write();
            self.layout
                .delete(page_guard.data_mut(), record_id.slot)
                .map_err(|_| DbError::Storage(format!("Record {record_id} is not stored")))?;
            page_guard.mark_dirty(Some(tid));
        }
        Ok(vec![page])
    }

    fn check_table(&self, page_id: PageId) -> Result<()> {
        if page_id.table_id != self.table_id {
            return Err(DbError::Storage(format!(
                "Page {page_id} does not belong to table {}",
                self.table_id
            )));
        }
        Ok(())
    }
}
