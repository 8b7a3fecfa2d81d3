use super::OpIterator;
use common::{EmberError, SchemaMapping, Tuple};

/// Rearranges and prunes tuple fields per an ordered column list.
///
/// Duplicate names in the projection list are silently deduplicated,
/// preserving first-occurrence order. The output mapping re-indexes the
/// projected columns 0..n-1, optionally under output aliases. When the
/// resolved index list is the identity over the child's arity the tuple is
/// passed through unchanged.
pub struct Project {
    indices: Vec<usize>,
    identity: bool,
    schema: SchemaMapping,
    child: Box<dyn OpIterator>,
}

impl Project {
    /// Constructs a projection keeping the given columns under their own
    /// names.
    ///
    /// # Arguments
    ///
    /// * `columns` - Ordered column names to keep; resolved in the child
    ///   mapping.
    /// * `child` - Operator producing the input tuples.
    pub fn new(columns: &[String], child: Box<dyn OpIterator>) -> Result<Self, EmberError> {
        Self::build(columns, None, child)
    }

    /// Constructs a projection that renames the kept columns.
    ///
    /// # Arguments
    ///
    /// * `columns` - Ordered column names, resolved in the child mapping.
    /// * `aliases` - Output names, parallel to `columns`.
    /// * `child` - Operator producing the input tuples.
    pub fn new_with_aliases(
        columns: &[String],
        aliases: &[String],
        child: Box<dyn OpIterator>,
    ) -> Result<Self, EmberError> {
        if columns.len() != aliases.len() {
            return Err(EmberError::PlanError(format!(
                "projection has {} columns but {} aliases",
                columns.len(),
                aliases.len()
            )));
        }
        Self::build(columns, Some(aliases), child)
    }

    fn build(
        columns: &[String],
        aliases: Option<&[String]>,
        child: Box<dyn OpIterator>,
    ) -> Result<Self, EmberError> {
        let mut indices = Vec::new();
        let mut names = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for (i, col) in columns.iter().enumerate() {
            if !seen.insert(col.clone()) {
                continue;
            }
            let idx = child.schema().index_of(col).ok_or_else(|| {
                EmberError::PlanError(format!("column {} not found in schema mapping", col))
            })?;
            indices.push(idx);
            names.push(match aliases {
                Some(a) => a[i].clone(),
                None => col.clone(),
            });
        }

        let identity = indices.len() == child.schema().size()
            && indices.iter().enumerate().all(|(pos, idx)| pos == *idx);
        let schema = SchemaMapping::new(names);
        Ok(Self {
            indices,
            identity,
            schema,
            child,
        })
    }
}

impl OpIterator for Project {
    fn next(&mut self) -> Result<Option<Tuple>, EmberError> {
        let tuple = match self.child.next()? {
            Some(t) => t,
            None => return Ok(None),
        };
        if self.identity {
            return Ok(Some(tuple));
        }
        let mut fields = Vec::with_capacity(self.indices.len());
        for idx in &self.indices {
            let field = tuple.get_field(*idx).ok_or_else(|| {
                EmberError::ExecutionError(format!(
                    "tuple of arity {} has no field at index {}",
                    tuple.size(),
                    idx
                ))
            })?;
            fields.push(field.clone());
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
