use super::OpIterator;
use common::{EmberError, Expression, SchemaMapping, Tuple};

/// Tuple-nested-loop join over a left (outer) and right (inner) child.
///
/// For each outer tuple the inner child is rewound and scanned in full;
/// matching concatenations are emitted in outer-major, inner-minor order.
/// Without a predicate this is the Cartesian product. The combined mapping
/// is the left mapping followed by the right mapping shifted by the left
/// arity.
pub struct Join {
    predicate: Option<Expression>,
    schema: SchemaMapping,
    left: Box<dyn OpIterator>,
    right: Box<dyn OpIterator>,
    current_left: Option<Tuple>,
}

impl Join {
    /// Constructs a join.
    ///
    /// # Arguments
    ///
    /// * `predicate` - Join condition, or `None` for a cross join.
    /// * `left` - Outer child.
    /// * `right` - Inner child; rewound once per outer tuple.
    pub fn new(
        predicate: Option<Expression>,
        left: Box<dyn OpIterator>,
        right: Box<dyn OpIterator>,
    ) -> Result<Self, EmberError> {
        let schema = left.schema().merge(right.schema());
        if let Some(p) = &predicate {
            p.validate(&schema)?;
        }
        Ok(Self {
            predicate,
            schema,
            left,
            right,
            current_left: None,
        })
    }
}

impl OpIterator for Join {
    fn next(&mut self) -> Result<Option<Tuple>, EmberError> {
        loop {
            let outer = match &self.current_left {
                Some(t) => t.clone(),
                None => match self.left.next()? {
                    Some(t) => {
                        self.right.rewind()?;
                        self.current_left = Some(t.clone());
                        t
                    }
                    None => return Ok(None),
                },
            };

            while let Some(inner) = self.right.next()? {
                let joined = outer.merge(&inner);
                match &self.predicate {
                    None => return Ok(Some(joined)),
                    Some(p) => {
                        if p.eval_predicate(&joined, &self.schema)? {
                            return Ok(Some(joined));
                        }
                    }
                }
            }

            // inner exhausted, advance the outer
            self.current_left = None;
        }
    }

    fn rewind(&mut self) -> Result<(), EmberError> {
        self.left.rewind()?;
        self.right.rewind()?;
        self.current_left = None;
        Ok(())
    }

    fn schema(&self) -> &SchemaMapping {
        &self.schema
    }
}
