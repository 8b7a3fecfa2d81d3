use super::OpIterator;
use common::{EmberError, Expression, Field, SchemaMapping, Tuple, Value};
use std::collections::HashMap;

/// Blocking group-by SUM aggregation.
///
/// With no group-by expressions this is a global aggregation: one 64-bit
/// accumulator per SUM, and exactly one output tuple even for empty input.
/// With group-by expressions, one accumulator vector is kept per distinct
/// group key and one tuple is emitted per group, its fields being the
/// group-by values followed by the sums. Groups are emitted in first-
/// appearance order, but callers must not rely on any particular order.
///
/// The output mapping labels group-by columns `Group` (or `Group_i` when
/// there is more than one) starting at index 0, with `SUM_i` immediately
/// after; a global aggregation maps `SUM_i -> i`.
pub struct Aggregate {
    group_by: Vec<Expression>,
    sums: Vec<Expression>,
    input_schema: SchemaMapping,
    schema: SchemaMapping,
    child: Box<dyn OpIterator>,
    buffer: Option<Vec<Tuple>>,
    cursor: usize,
}

impl Aggregate {
    /// Constructs the aggregation.
    ///
    /// # Arguments
    ///
    /// * `group_by` - Group-by expressions, possibly empty.
    /// * `sums` - SUM inner expressions, possibly empty.
    /// * `child` - Operator producing the input tuples.
    pub fn new(
        group_by: Vec<Expression>,
        sums: Vec<Expression>,
        child: Box<dyn OpIterator>,
    ) -> Result<Self, EmberError> {
        let input_schema = child.schema().clone();
        for expr in group_by.iter().chain(sums.iter()) {
            expr.validate(&input_schema)?;
        }

        let mut columns = Vec::new();
        for i in 0..group_by.len() {
            columns.push(Self::group_label(i, group_by.len()));
        }
        for i in 0..sums.len() {
            columns.push(format!("SUM_{}", i));
        }
        let schema = SchemaMapping::new(columns);

        Ok(Self {
            group_by,
            sums,
            input_schema,
            schema,
            child,
            buffer: None,
            cursor: 0,
        })
    }

    /// The synthetic name of the i-th group-by column.
    pub fn group_label(i: usize, total: usize) -> String {
        if total == 1 {
            String::from("Group")
        } else {
            format!("Group_{}", i)
        }
    }

    fn materialize(&mut self) -> Result<(), EmberError> {
        if self.group_by.is_empty() {
            self.buffer = Some(vec![self.aggregate_global()?]);
        } else {
            self.buffer = Some(self.aggregate_grouped()?);
        }
        Ok(())
    }

    fn aggregate_global(&mut self) -> Result<Tuple, EmberError> {
        let mut accumulators = vec![0i64; self.sums.len()];
        while let Some(tuple) = self.child.next()? {
            for (i, sum) in self.sums.iter().enumerate() {
                accumulators[i] += sum.eval_int(&tuple, &self.input_schema)?;
            }
        }
        Ok(Tuple::new(accumulators.into_iter().map(Field::Int).collect()))
    }

    fn aggregate_grouped(&mut self) -> Result<Vec<Tuple>, EmberError> {
        // group index by key, key list in first-appearance order
        let mut group_index: HashMap<Vec<Field>, usize> = HashMap::new();
        let mut group_keys: Vec<Vec<Field>> = Vec::new();
        let mut accumulators: Vec<Vec<i64>> = Vec::new();

        while let Some(tuple) = self.child.next()? {
            let mut key = Vec::with_capacity(self.group_by.len());
            for expr in &self.group_by {
                key.push(match expr.evaluate(&tuple, &self.input_schema)? {
                    Value::Int(i) => Field::Int(i),
                    Value::Text(s) => Field::Text(s),
                    Value::Bool(_) => {
                        return Err(EmberError::TypeError(format!(
                            "group key must be a value, not a condition: {}",
                            expr
                        )));
                    }
                });
            }

            let slot = match group_index.get(&key) {
                Some(i) => *i,
                None => {
                    group_index.insert(key.clone(), group_keys.len());
                    group_keys.push(key);
                    accumulators.push(vec![0i64; self.sums.len()]);
                    accumulators.len() - 1
                }
            };
            for (i, sum) in self.sums.iter().enumerate() {
                accumulators[slot][i] += sum.eval_int(&tuple, &self.input_schema)?;
            }
        }

        let mut out = Vec::with_capacity(group_keys.len());
        for (key, sums) in group_keys.into_iter().zip(accumulators.into_iter()) {
            let mut fields = key;
            fields.extend(sums.into_iter().map(Field::Int));
            out.push(Tuple::new(fields));
        }
        Ok(out)
    }
}

impl OpIterator for Aggregate {
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

    /// Rewinds the cursor over the materialized group table without
    /// re-running the aggregation.
    fn rewind(&mut self) -> Result<(), EmberError> {
        self.cursor = 0;
        Ok(())
    }

    fn schema(&self) -> &SchemaMapping {
        &self.schema
    }
}
