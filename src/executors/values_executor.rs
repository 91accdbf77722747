use super::{Executor, ExecutorState};
use crate::error::Result;
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

/// Emits a fixed list of tuples.
pub struct ValuesExecutor {
    schema: Schema,
    tuples: Vec<Tuple>,
    position: usize,
    state: ExecutorState,
}

impl ValuesExecutor {
    pub fn new(schema: Schema, tuples: Vec<Tuple>) -> Self {
        Self {
            schema,
            tuples,
            position: 0,
            state: ExecutorState::default(),
        }
    }
}

impl Executor for ValuesExecutor {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&mut self) -> Result<()> {
        self.position = 0;
        self.state.open();
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        let tuple = self.tuples.get(self.position).cloned();
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
        self.state.close();
    }

    fn state(&mut self) -> &mut ExecutorState {
        &mut self.state
    }
}
