use super::OpIterator;
use common::{EmberError, SchemaMapping, Tuple};
use std::cmp::Ordering;

/// One resolved ORDER BY key: a tuple position and a direction.
#[derive(Debug, Clone)]
struct SortKey {
    index: usize,
    ascending: bool,
}

/// Compares tuples on a list of integer-valued keys.
///
/// Extracting keys and comparing them are separate steps so the comparison
/// itself is infallible; a non-integer field at a key position surfaces as
/// a type error during extraction. Swapping this type out is the seam for
/// widening the comparable field kinds later.
pub struct TupleComparator {
    keys: Vec<SortKey>,
}

impl TupleComparator {
    fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Extract the key vector for one tuple.
    fn key_of(&self, tuple: &Tuple) -> Result<Vec<i64>, EmberError> {
        self.keys
            .iter()
            .map(|k| {
                tuple
                    .get_field(k.index)
                    .and_then(|f| f.as_int())
                    .ok_or_else(|| {
                        EmberError::TypeError(format!(
                            "sort key at index {} is not an integer",
                            k.index
                        ))
                    })
            })
            .collect()
    }

    /// Lexicographic comparison over the keys, honoring per-key direction.
    fn compare(&self, left: &[i64], right: &[i64]) -> Ordering {
        for (k, (l, r)) in self.keys.iter().zip(left.iter().zip(right.iter())) {
            let cmp = l.cmp(r);
            let cmp = if k.ascending { cmp } else { cmp.reverse() };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    }
}

/// Blocking sort over the ORDER BY keys.
///
/// Buffers the entire child on the first `next()`, totally orders the
/// buffer, then streams from it. `rewind` resets the cursor without
/// re-reading the child.
pub struct Sort {
    comparator: TupleComparator,
    schema: SchemaMapping,
    child: Box<dyn OpIterator>,
    buffer: Option<Vec<Tuple>>,
    cursor: usize,
}

impl Sort {
    /// Constructs a sort.
    ///
    /// # Arguments
    ///
    /// * `keys` - Ordered `(column, ascending)` pairs; each column must
    ///   resolve in the child mapping.
    /// * `child` - Operator producing the tuples to sort.
    pub fn new(keys: &[(String, bool)], child: Box<dyn OpIterator>) -> Result<Self, EmberError> {
        let mut sort_keys = Vec::new();
        for (column, ascending) in keys {
            let index = child.schema().index_of(column).ok_or_else(|| {
                EmberError::PlanError(format!(
                    "order by column {} not found in schema mapping",
                    column
                ))
            })?;
            sort_keys.push(SortKey {
                index,
                ascending: *ascending,
            });
        }
        let schema = child.schema().clone();
        Ok(Self {
            comparator: TupleComparator::new(sort_keys),
            schema,
            child,
            buffer: None,
            cursor: 0,
        })
    }

    fn materialize(&mut self) -> Result<(), EmberError> {
        let mut keyed: Vec<(Vec<i64>, Tuple)> = Vec::new();
        while let Some(tuple) = self.child.next()? {
            let key = self.comparator.key_of(&tuple)?;
            keyed.push((key, tuple));
        }
        keyed.sort_by(|a, b| self.comparator.compare(&a.0, &b.0));
        self.buffer = Some(keyed.into_iter().map(|(_, t)| t).collect());
        Ok(())
    }
}

impl OpIterator for Sort {
    fn next(&mut self) -> Result<Option<Tuple>, EmberError> {
        if self.buffer.is_none() {
            self.materialize()?;
        }
        let buffer = match &self.buffer {
            Some(b) => b,
            None => return Ok(None),
        };
        if self.cursor < buffer.len() {
            let tuple = buffer[self.cursor].clone();
            self.cursor += 1;
            Ok(Some(tuple))
        } else {
            Ok(None)
        }
    }

    fn rewind(&mut self) -> Result<(), EmberError> {
        self.cursor = 0;
        Ok(())
    }

    fn schema(&self) -> &SchemaMapping {
        &self.schema
    }
}
