use super::OpIterator;
use common::{EmberError, Field, SchemaMapping, Tuple};

/// Appends constant integer columns to every child tuple.
///
/// Used for literal SUM rewriting: `SUM(k)` becomes a reference to a
/// synthetic `LITERAL_SUM_i` column that this operator materializes, so
/// the aggregation keeps its uniform evaluate-against-a-tuple contract.
/// Each appended column lands at the next free index of the mapping.
pub struct LiteralAppend {
    literals: Vec<(String, i64)>,
    schema: SchemaMapping,
    child: Box<dyn OpIterator>,
}

impl LiteralAppend {
    /// Constructs the append step.
    ///
    /// # Arguments
    ///
    /// * `literals` - Ordered `(alias, constant)` pairs to append.
    /// * `child` - Operator producing the input tuples.
    pub fn new(literals: Vec<(String, i64)>, child: Box<dyn OpIterator>) -> Self {
        let mut schema = child.schema().clone();
        for (alias, _) in &literals {
            schema = schema.extend(alias);
        }
        Self {
            literals,
            schema,
            child,
        }
    }
}

impl OpIterator for LiteralAppend {
    fn next(&mut self) -> Result<Option<Tuple>, EmberError> {
        let tuple = match self.child.next()? {
            Some(t) => t,
            None => return Ok(None),
        };
        let mut fields = tuple.field_vals;
        for (_, value) in &self.literals {
            fields.push(Field::Int(*value));
        }
        Ok(Some(Tuple::new(fields)))
    }

    fn rewind(&mut self) -> Result<(), EmberError> {
        self.child.rewind()
    }

    fn schema(&self) -> &SchemaMapping {
        &self.schema
    }
}
