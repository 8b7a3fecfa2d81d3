use super::OpIterator;
use common::{EmberError, Expression, SchemaMapping, Tuple};

/// Filters child tuples by a predicate expression.
///
/// A predicate referencing a column absent from the child's mapping is a
/// plan error at construction, not per tuple.
pub struct Filter {
    predicate: Expression,
    schema: SchemaMapping,
    child: Box<dyn OpIterator>,
}

impl Filter {
    /// Constructs a filter over the child.
    ///
    /// # Arguments
    ///
    /// * `predicate` - Selection condition; must evaluate to a boolean.
    /// * `child` - Operator producing the tuples to filter.
    pub fn new(predicate: Expression, child: Box<dyn OpIterator>) -> Result<Self, EmberError> {
        predicate.validate(child.schema())?;
        let schema = child.schema().clone();
        Ok(Self {
            predicate,
            schema,
            child,
        })
    }
}

impl OpIterator for Filter {
    fn next(&mut self) -> Result<Option<Tuple>, EmberError> {
        while let Some(tuple) = self.child.next()? {
            if self.predicate.eval_predicate(&tuple, &self.schema)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> Result<(), EmberError> {
        self.child.rewind()
    }

    fn schema(&self) -> &SchemaMapping {
        &self.schema
    }
}
