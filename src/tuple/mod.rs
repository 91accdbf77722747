use std::fmt::Display;

use self::value::Value;
use crate::common::RecordId;

pub mod schema;
pub mod value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tuple {
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            record_id: None,
        }
    }

    pub fn with_record_id(values: Vec<Value>, record_id: RecordId) -> Self {
        Self {
            values,
            record_id: Some(record_id),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Where the tuple is stored, if it has been persisted.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self
            .values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>();
        write!(f, "{}", values.join("\t"))
    }
}
