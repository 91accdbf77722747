use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use super::{Executor, ExecutorState};
use crate::error::{DbError, Result};
use crate::tuple::schema::{ColumnDefinition, Schema, TypeId};
use crate::tuple::value::Value;
use crate::tuple::Tuple;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl FromStr for AggregateOp {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "min" => Ok(AggregateOp::Min),
            "max" => Ok(AggregateOp::Max),
            "sum" => Ok(AggregateOp::Sum),
            "avg" => Ok(AggregateOp::Avg),
            "count" => Ok(AggregateOp::Count),
            s => Err(DbError::Unsupported(format!("Unknown aggregate {s}"))),
        }
    }
}

impl Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
        };
        write!(f, "{op}")
    }
}

#[derive(Debug)]
struct Accumulator {
    count: i64,
    sum: i64,
    min: i32,
    max: i32,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: i32::MAX,
            max: i32::MIN,
        }
    }
}

impl Accumulator {
    fn add(&mut self, value: &Value) {
        self.count += 1;
        if let Value::Integer(val) = value {
            self.sum += *val as i64;
            self.min = self.min.min(*val);
            self.max = self.max.max(*val);
        }
    }

    fn result(&self, op: AggregateOp) -> Result<Value> {
        let result = match op {
            AggregateOp::Min => self.min as i64,
            AggregateOp::Max => self.max as i64,
            AggregateOp::Sum => self.sum,
            AggregateOp::Avg => self.sum / self.count.max(1),
            AggregateOp::Count => self.count,
        };
        i32::try_from(result).map(Value::Integer).map_err(|_| {
            DbError::Unsupported(format!("Result of {op} does not fit an integer: {result}"))
        })
    }
}

/// Computes one aggregate over a column of its child, optionally grouped by
/// another column. Groups are emitted in ascending order of the group value.
///
/// The child is consumed completely when the executor is opened.
pub struct AggregateExecutor<'a> {
    child: Box<dyn Executor + 'a>,
    agg_column: usize,
    group_by: Option<usize>,
    op: AggregateOp,
    schema: Schema,
    results: Vec<Tuple>,
    position: usize,
    state: ExecutorState,
}

impl<'a> AggregateExecutor<'a> {
    pub fn new(
        child: Box<dyn Executor + 'a>,
        agg_column: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self> {
        let child_schema = child.schema();
        let agg_definition = child_schema.column(agg_column)?;
        if agg_definition.type_id() == TypeId::Text && op != AggregateOp::Count {
            return Err(DbError::Unsupported(format!(
                "{op} is not supported on text column {}",
                agg_definition.column_name()
            )));
        }

        let mut columns = vec![];
        if let Some(group_by) = group_by {
            columns.push(child_schema.column(group_by)?.clone());
        }
        columns.push(ColumnDefinition::new(
            TypeId::Integer,
            format!("{op}({})", agg_definition.column_name()),
        ));

        Ok(Self {
            schema: Schema::new(columns),
            child,
            agg_column,
            group_by,
            op,
            results: vec![],
            position: 0,
            state: ExecutorState::default(),
        })
    }

    fn aggregate(&mut self) -> Result<Vec<Tuple>> {
        let mut groups: BTreeMap<Option<Value>, Accumulator> = BTreeMap::new();
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            let group = match self.group_by {
                Some(group_by) => Some(column_value(&tuple, group_by)?.clone()),
                None => None,
            };
            groups
                .entry(group)
                .or_default()
                .add(column_value(&tuple, self.agg_column)?);
        }

        // an ungrouped count over no input is still a count
        if groups.is_empty() && self.group_by.is_none() && self.op == AggregateOp::Count {
            groups.insert(None, Accumulator::default());
        }

        groups
            .into_iter()
            .map(|(group, accumulator)| {
                let mut values = vec![];
                values.extend(group);
                values.push(accumulator.result(self.op)?);
                Ok(Tuple::new(values))
            })
            .collect()
    }
}

fn column_value(tuple: &Tuple, column: usize) -> Result<&Value> {
    tuple
        .value(column)
        .ok_or_else(|| DbError::SchemaMismatch(format!("Tuple has no column {column}")))
}

impl Executor for AggregateExecutor<'_> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.child.open()?;
        self.results = self.aggregate()?;
        self.position = 0;
        self.state.open();
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        let tuple = self.results.get(self.position).cloned();
        if tuple.is_some() {
            self.position += 1;
        }
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        self.state.rewind();
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results.clear();
        self.state.close();
    }

    fn state(&mut self) -> &mut ExecutorState {
        &mut self.state
    }
}
