use std::sync::Arc;

use super::{Executor, ExecutorState};
use crate::buffer::page_cache::PageCache;
use crate::common::TableId;
use crate::concurrency::TransactionId;
use crate::error::{DbError, Result};
use crate::storage::{PageStore, TableIterator};
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

pub struct SeqScanExecutor<'a> {
    store: Arc<PageStore>,
    cache: &'a PageCache,
    tid: TransactionId,
    table_iter: Option<TableIterator<'a>>,
    state: ExecutorState,
}

impl<'a> SeqScanExecutor<'a> {
    pub fn new(cache: &'a PageCache, tid: TransactionId, table_id: TableId) -> Result<Self> {
        Ok(Self {
            store: cache.catalog().get_store(table_id)?,
            cache,
            tid,
            table_iter: None,
            state: ExecutorState::default(),
        })
    }
}

impl Executor for SeqScanExecutor<'_> {
    fn schema(&self) -> &Schema {
        self.store.schema()
    }

    fn open(&mut self) -> Result<()> {
        self.table_iter = Some(self.store.iter(self.cache, self.tid));
        self.state.open();
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        self.table_iter
            .as_mut()
            .ok_or(DbError::NotOpen)?
            .next()
            .transpose()
    }

    fn rewind(&mut self) -> Result<()> {
        self.table_iter = Some(self.store.iter(self.cache, self.tid));
        self.state.rewind();
        Ok(())
    }

    fn close(&mut self) {
        self.table_iter = None;
        self.state.close();
    }

    fn state(&mut self) -> &mut ExecutorState {
        &mut self.state
    }
}
