use super::OpIterator;
use common::{EmberError, Field, SchemaMapping, Tuple};
use std::collections::HashSet;

/// Streaming duplicate elimination.
///
/// Keeps a set of already-emitted field vectors and forwards only tuples
/// not yet seen, preserving the child's first-occurrence order. Equality is
/// on the field values themselves, not on a rendered string.
pub struct Distinct {
    seen: HashSet<Vec<Field>>,
    schema: SchemaMapping,
    child: Box<dyn OpIterator>,
}

impl Distinct {
    pub fn new(child: Box<dyn OpIterator>) -> Self {
        let schema = child.schema().clone();
        Self {
            seen: HashSet::new(),
            schema,
            child,
        }
    }
}

impl OpIterator for Distinct {
    fn next(&mut self) -> Result<Option<Tuple>, EmberError> {
        while let Some(tuple) = self.child.next()? {
            if self.seen.insert(tuple.field_vals.clone()) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> Result<(), EmberError> {
        self.seen.clear();
        self.child.rewind()
    }

    fn schema(&self) -> &SchemaMapping {
        &self.schema
    }
}
