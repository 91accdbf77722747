use lazy_static::lazy_static;

use super::{Executor, ExecutorState};
use crate::buffer::page_cache::PageCache;
use crate::concurrency::TransactionId;
use crate::error::Result;
use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
use crate::tuple::value::Value;
use crate::tuple::Tuple;

lazy_static! {
    static ref DELETE_EXECUTOR_SCHEMA: Schema =
        Schema::new(vec![ColumnDefinition::new(TypeId::Integer, "deleted")]);
}

/// Deletes every tuple its child produces. The child's tuples must carry
/// record ids, so it is normally a scan of the table, possibly filtered.
pub struct DeleteExecutor<'a> {
    cache: &'a PageCache,
    tid: TransactionId,
    child: Box<dyn Executor + 'a>,
    tuples_deleted: Option<i32>,
    done: bool,
    state: ExecutorState,
}

impl<'a> DeleteExecutor<'a> {
    pub fn new(cache: &'a PageCache, tid: TransactionId, child: Box<dyn Executor + 'a>) -> Self {
        Self {
            cache,
            tid,
            child,
            tuples_deleted: None,
            done: false,
            state: ExecutorState::default(),
        }
    }

    fn delete_all(&mut self) -> Result<i32> {
        let mut tuples_deleted = 0;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            self.cache.apply_delete(self.tid, &tuple)?;
            tuples_deleted += 1;
        }
        Ok(tuples_deleted)
    }
}

impl Executor for DeleteExecutor<'_> {
    fn schema(&self) -> &Schema {
        &DELETE_EXECUTOR_SCHEMA
    }

    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.done = false;
        self.state.open();
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        let tuples_deleted = match self.tuples_deleted {
            Some(tuples_deleted) => tuples_deleted,
            None => {
                let tuples_deleted = self.delete_all()?;
                self.tuples_deleted = Some(tuples_deleted);
                tuples_deleted
            }
        };
        self.done = true;
        Ok(Some(Tuple::new(vec![Value::Integer(tuples_deleted)])))
    }

    fn rewind(&mut self) -> Result<()> {
        self.done = false;
        self.state.rewind();
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.state.close();
    }

    fn state(&mut self) -> &mut ExecutorState {
        &mut self.state
    }
}
