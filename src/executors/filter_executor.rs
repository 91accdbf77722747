use std::fmt::Display;

use super::{Executor, ExecutorState};
use crate::error::{DbError, Result};
use crate::tuple::schema::Schema;
pub use crate::tuple::value::Op;
use crate::tuple::value::Value;
use crate::tuple::Tuple;

/// Compares one column of a tuple against a constant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    column: usize,
    op: Op,
    operand: Value,
}

impl Predicate {
    pub fn new(column: usize, op: Op, operand: Value) -> Self {
        Self {
            column,
            op,
            operand,
        }
    }

    /// Parses `column op value` against `schema`, e.g. `age >= 18` or `name like ann`.
    pub fn parse(schema: &Schema, input: &str) -> Result<Self> {
        let mut parts = input.trim().splitn(3, char::is_whitespace);
        let (column, op, operand) = match (parts.next(), parts.next(), parts.next()) {
            (Some(column), Some(op), Some(operand)) => (column, op, operand.trim()),
            _ => {
                return Err(DbError::SchemaMismatch(format!(
                    "Expected 'column operator value', got '{input}'"
                )))
            }
        };
        let index = schema
            .column_index(column)
            .ok_or_else(|| DbError::SchemaMismatch(format!("Unknown column {column}")))?;
        let type_id = schema.column(index)?.type_id();
        Ok(Self::new(index, op.parse()?, Value::parse(type_id, operand)?))
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Value {
        &self.operand
    }

    pub fn filter(&self, tuple: &Tuple) -> bool {
        tuple
            .value(self.column)
            .map_or(false, |value| value.compare(self.op, &self.operand))
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${} {} {}", self.column, self.op, self.operand)
    }
}

/// Passes on the tuples of its child that satisfy a predicate.
pub struct FilterExecutor<'a> {
    predicate: Predicate,
    child: Box<dyn Executor + 'a>,
    state: ExecutorState,
}

impl<'a> FilterExecutor<'a> {
    pub fn new(predicate: Predicate, child: Box<dyn Executor + 'a>) -> Result<Self> {
        let column = child.schema().column(predicate.column())?;
        if column.type_id() != predicate.operand().type_id() {
            return Err(DbError::SchemaMismatch(format!(
                "Cannot compare column {} of type {} with {}",
                column.column_name(),
                column.type_id(),
                predicate.operand()
            )));
        }
        Ok(Self {
            predicate,
            child,
            state: ExecutorState::default(),
        })
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl Executor for FilterExecutor<'_> {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.state.open();
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.filter(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> Result<()> {
        self.child.rewind()?;
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

    use super::{FilterExecutor, Op, Predicate};
    use crate::executors::values_executor::ValuesExecutor;
    use crate::executors::{collect, Executor};
    use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
    use crate::tuple::value::Value;
    use crate::tuple::Tuple;

    fn people() -> ValuesExecutor {
        let schema = Schema::new(vec![
            ColumnDefinition::new(TypeId::Integer, "age"),
            ColumnDefinition::new(TypeId::Text, "name"),
        ]);
        let tuples = [(17, "ann"), (18, "bob"), (42, "joanna"), (65, "carl")]
            .into_iter()
            .map(|(age, name)| {
                Tuple::new(vec![Value::Integer(age), Value::String(name.to_owned())])
            })
            .collect();
        ValuesExecutor::new(schema, tuples)
    }

    fn names(tuples: Vec<Tuple>) -> Vec<String> {
        tuples
            .into_iter()
            .map(|tuple| tuple.values()[1].to_string())
            .collect()
    }

    fn run(predicate: &str) -> Result<Vec<String>> {
        let child = people();
        let predicate = Predicate::parse(child.schema(), predicate)?;
        let mut filter = FilterExecutor::new(predicate, Box::new(child))?;
        Ok(names(collect(&mut filter)?))
    }

    #[test]
    fn filters_by_comparison() -> Result<()> {
        assert_eq!(run("age >= 18")?, vec!["bob", "joanna", "carl"]);
        assert_eq!(run("age < 18")?, vec!["ann"]);
        assert_eq!(run("age = 42")?, vec!["joanna"]);
        assert_eq!(run("age <> 42")?, vec!["ann", "bob", "carl"]);
        assert_eq!(run("name > bob")?, vec!["joanna", "carl"]);
        Ok(())
    }

    #[test]
    fn like_matches_substrings() -> Result<()> {
        assert_eq!(run("name like ann")?, vec!["ann", "joanna"]);
        assert_eq!(run("age LIKE 65")?, vec!["carl"]);
        Ok(())
    }

    #[test]
    fn invalid_predicates_are_rejected() {
        let child = people();
        let schema = child.schema().clone();
        assert!(Predicate::parse(&schema, "age").is_err());
        assert!(Predicate::parse(&schema, "height > 3").is_err());
        assert!(Predicate::parse(&schema, "age ~ 3").is_err());
        assert!(Predicate::parse(&schema, "age > old").is_err());

        let predicate = Predicate::new(1, Op::Equals, Value::Integer(3));
        assert!(FilterExecutor::new(predicate, Box::new(child)).is_err());
    }

    #[test]
    fn operand_may_contain_spaces() -> Result<()> {
        let schema = people().schema().clone();
        let predicate = Predicate::parse(&schema, "name = mary ann")?;
        assert_eq!(predicate.operand(), &Value::String("mary ann".to_owned()));
        assert_eq!(predicate.to_string(), "$1 = mary ann");
        Ok(())
    }
}
