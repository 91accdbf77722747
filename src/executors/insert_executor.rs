use lazy_static::lazy_static;

use super::{Executor, ExecutorState};
use crate::buffer::page_cache::PageCache;
use crate::common::TableId;
use crate::concurrency::TransactionId;
use crate::error::{DbError, Result};
use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
use crate::tuple::value::Value;
use crate::tuple::Tuple;

lazy_static! {
    static ref INSERT_EXECUTOR_SCHEMA: Schema =
        Schema::new(vec![ColumnDefinition::new(TypeId::Integer, "inserted")]);
}

/// Inserts every tuple of its child into a table and emits a single tuple
/// holding the number of inserted tuples.
pub struct InsertExecutor<'a> {
    cache: &'a PageCache,
    tid: TransactionId,
    table_id: TableId,
    child: Box<dyn Executor + 'a>,
    tuples_inserted: Option<i32>,
    done: bool,
    state: ExecutorState,
}

impl<'a> InsertExecutor<'a> {
    pub fn new(
        cache: &'a PageCache,
        tid: TransactionId,
        table_id: TableId,
        child: Box<dyn Executor + 'a>,
    ) -> Result<Self> {
        let table_schema = cache.catalog().get_schema(table_id)?;
        if !table_schema.same_types(child.schema()) {
            return Err(DbError::SchemaMismatch(format!(
                "Cannot insert {} into table with columns {}",
                child.schema(),
                table_schema
            )));
        }
        Ok(Self {
            cache,
            tid,
            table_id,
            child,
            tuples_inserted: None,
            done: false,
            state: ExecutorState::default(),
        })
    }

    fn insert_all(&mut self) -> Result<i32> {
        let mut tuples_inserted = 0;
        while self.child.has_next()? {
            let mut tuple = self.child.next()?;
            self.cache.apply_insert(self.tid, self.table_id, &mut tuple)?;
            tuples_inserted += 1;
        }
        Ok(tuples_inserted)
    }
}

impl Executor for InsertExecutor<'_> {
    fn schema(&self) -> &Schema {
        &INSERT_EXECUTOR_SCHEMA
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
        let tuples_inserted = match self.tuples_inserted {
            Some(tuples_inserted) => tuples_inserted,
            None => {
                let tuples_inserted = self.insert_all()?;
                self.tuples_inserted = Some(tuples_inserted);
                tuples_inserted
            }
        };
        self.done = true;
        Ok(Some(Tuple::new(vec![Value::Integer(tuples_inserted)])))
    }

    /// Emits the count again, nothing is inserted twice.
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

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::InsertExecutor;
    use crate::concurrency::TransactionId;
    use crate::error::DbError;
    use crate::executors::seq_scan_executor::SeqScanExecutor;
    use crate::executors::values_executor::ValuesExecutor;
    use crate::executors::{collect, Executor};
    use crate::test_helpers::TestDb;
    use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
    use crate::tuple::value::Value;
    use crate::tuple::Tuple;

    fn numbers(values: &[i32]) -> Box<ValuesExecutor> {
        let schema = Schema::new(vec![ColumnDefinition::new(TypeId::Integer, "n")]);
        let tuples = values
            .iter()
            .map(|&n| Tuple::new(vec![Value::Integer(n)]))
            .collect();
        Box::new(ValuesExecutor::new(schema, tuples))
    }

    #[test]
    fn inserts_child_tuples_and_reports_count() -> Result<()> {
        let db = TestDb::new(8)?;
        let table_id = db.create_int_table("numbers", 1)?;
        let tid = TransactionId::new();

        let mut insert = InsertExecutor::new(&db.cache, tid, table_id, numbers(&[1, 3, 5]))?;
        insert.open()?;
        assert_eq!(insert.next()?.values(), &[Value::Integer(3)]);
        assert!(!insert.has_next()?);
        insert.rewind()?;
        assert_eq!(insert.next()?.values(), &[Value::Integer(3)]);
        insert.close();
        db.cache.end_transaction(tid, true)?;

        assert_eq!(db.scan(table_id)?.len(), 3);
        Ok(())
    }

    #[test]
    fn can_insert_from_own_table() -> Result<()> {
        let db = TestDb::new(8)?;
        let table_id = db.create_int_table("numbers", 1)?;
        let tid = TransactionId::new();
        collect(&mut InsertExecutor::new(
            &db.cache,
            tid,
            table_id,
            numbers(&[1, 3, 5, 7, 9]),
        )?)?;

        // the scan buffers a page at a time, so the copied rows are appended behind it
        let scan = SeqScanExecutor::new(&db.cache, tid, table_id)?;
        let result = collect(&mut InsertExecutor::new(
            &db.cache,
            tid,
            table_id,
            Box::new(scan),
        )?)?;
        assert_eq!(result[0].values(), &[Value::Integer(5)]);
        db.cache.end_transaction(tid, true)?;

        let mut numbers = db
            .scan(table_id)?
            .iter()
            .filter_map(|tuple| tuple.values()[0].as_i32())
            .collect::<Vec<_>>();
        numbers.sort();
        assert_eq!(numbers, vec![1, 1, 3, 3, 5, 5, 7, 7, 9, 9]);
        Ok(())
    }

    #[test]
    fn mismatching_child_is_rejected() -> Result<()> {
        let db = TestDb::new(8)?;
        let table_id = db.create_int_table("pairs", 2)?;
        let result = InsertExecutor::new(&db.cache, TransactionId::new(), table_id, numbers(&[1]));
        assert!(matches!(result, Err(DbError::SchemaMismatch(_))));
        Ok(())
    }
}
