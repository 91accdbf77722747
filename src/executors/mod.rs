use crate::error::{DbError, Result};
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

pub mod aggregate_executor;
pub mod delete_executor;
pub mod filter_executor;
pub mod insert_executor;
pub mod seq_scan_executor;
pub mod values_executor;

/// Open flag and lookahead slot shared by every executor.
#[derive(Debug, Default)]
pub struct ExecutorState {
    open: bool,
    pending: Option<Tuple>,
}

impl ExecutorState {
    pub fn open(&mut self) {
        self.open = true;
        self.pending = None;
    }

    pub fn rewind(&mut self) {
        self.pending = None;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.pending = None;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// The pull-based iterator every operator implements.
///
/// Implementors produce tuples through `fetch_next`, returning `Ok(None)` at
/// the end. Callers use `has_next` and `next`. Errors are reserved for real
/// failures, the end of the sequence is never an error.
pub trait Executor {
    fn schema(&self) -> &Schema;

    fn open(&mut self) -> Result<()>;

    fn fetch_next(&mut self) -> Result<Option<Tuple>>;

    /// Restarts the sequence from its first tuple.
    fn rewind(&mut self) -> Result<()>;

    fn close(&mut self);

    fn state(&mut self) -> &mut ExecutorState;

    /// Whether another tuple is available. Calling it repeatedly does not skip tuples.
    fn has_next(&mut self) -> Result<bool> {
        if !self.state().is_open() {
            return Err(DbError::NotOpen);
        }
        if self.state().pending.is_none() {
            let tuple = self.fetch_next()?;
            self.state().pending = tuple;
        }
        Ok(self.state().pending.is_some())
    }

    /// Returns the next tuple, failing with `NoSuchElement` at the end.
    fn next(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(DbError::NoSuchElement);
        }
        self.state().pending.take().ok_or(DbError::NoSuchElement)
    }
}

/// Opens `executor`, drains it and closes it again.
pub fn collect(executor: &mut dyn Executor) -> Result<Vec<Tuple>> {
    executor.open()?;
    let mut tuples = vec![];
    while executor.has_next()? {
        tuples.push(executor.next()?);
    }
    executor.close();
    Ok(tuples)
}

#[cfg(test)]
mod tests {
    use super::values_executor::ValuesExecutor;
    use super::Executor;
    use crate::error::DbError;
    use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
    use crate::tuple::value::Value;
    use crate::tuple::Tuple;

    fn numbers(values: &[i32]) -> ValuesExecutor {
        let schema = Schema::new(vec![ColumnDefinition::new(TypeId::Integer, "n")]);
        let tuples = values
            .iter()
            .map(|&n| Tuple::new(vec![Value::Integer(n)]))
            .collect();
        ValuesExecutor::new(schema, tuples)
    }

    #[test]
    fn has_next_is_idempotent() {
        let mut executor = numbers(&[1, 2]);
        executor.open().unwrap();
        assert!(executor.has_next().unwrap());
        assert!(executor.has_next().unwrap());
        assert_eq!(executor.next().unwrap().values(), &[Value::Integer(1)]);
        assert_eq!(executor.next().unwrap().values(), &[Value::Integer(2)]);
        assert!(!executor.has_next().unwrap());
        assert!(matches!(executor.next(), Err(DbError::NoSuchElement)));
    }

    #[test]
    fn unopened_executor_fails() {
        let mut executor = numbers(&[1]);
        assert!(matches!(executor.has_next(), Err(DbError::NotOpen)));
        executor.open().unwrap();
        executor.close();
        assert!(matches!(executor.next(), Err(DbError::NotOpen)));
    }

    #[test]
    fn rewind_restarts_and_drops_lookahead() {
        let mut executor = numbers(&[1, 2, 3]);
        executor.open().unwrap();
        executor.next().unwrap();
        assert!(executor.has_next().unwrap());
        executor.rewind().unwrap();
        assert_eq!(super::collect(&mut executor).unwrap().len(), 3);
    }
}
