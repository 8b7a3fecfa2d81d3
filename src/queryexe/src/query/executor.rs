use crate::opiterator::OpIterator;
use common::{EmberError, SchemaMapping, Tuple};
use log::debug;
use std::io::Write;

/// Drives a physical plan and renders its output.
///
/// The driver pulls tuples from the root operator until exhaustion and
/// writes one CSV line per tuple: fields joined by `", "`, newline
/// terminated, no header row. A write failure aborts the query and leaves
/// the partial output undefined.
pub struct Executor {
    plan: Box<dyn OpIterator>,
}

impl Executor {
    /// Wraps the root operator of a physical plan.
    pub fn new(plan: Box<dyn OpIterator>) -> Self {
        Self { plan }
    }

    /// Returns the next tuple or `None` when the plan is exhausted.
    pub fn next(&mut self) -> Result<Option<Tuple>, EmberError> {
        self.plan.next()
    }

    /// Restart the plan's output sequence from the beginning.
    pub fn rewind(&mut self) -> Result<(), EmberError> {
        self.plan.rewind()
    }

    /// The mapping describing the plan's output tuples.
    pub fn schema(&self) -> &SchemaMapping {
        self.plan.schema()
    }

    /// Drain the plan into the writer; returns the number of rows written.
    pub fn write_all<W: Write>(&mut self, out: &mut W) -> Result<usize, EmberError> {
        let mut rows = 0;
        while let Some(tuple) = self.plan.next()? {
            writeln!(out, "{}", tuple)?;
            rows += 1;
        }
        out.flush()?;
        debug!("executor wrote {} rows", rows);
        Ok(rows)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::opiterator::TupleIterator;
    use common::testutil::*;

    #[test]
    fn test_write_all_renders_csv_lines() {
        let schema = SchemaMapping::for_table("R", &[String::from("A"), String::from("B")]);
        let plan = Box::new(TupleIterator::new(
            create_tuple_list(vec![vec![1, 2], vec![3, 4]]),
            schema,
        ));
        let mut executor = Executor::new(plan);
        let mut out = Vec::new();
        let rows = executor.write_all(&mut out).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "1, 2\n3, 4\n");
    }

    #[test]
    fn test_rewind_replays_output() {
        let schema = SchemaMapping::for_table("R", &[String::from("A")]);
        let plan = Box::new(TupleIterator::new(create_tuple_list(vec![vec![7]]), schema));
        let mut executor = Executor::new(plan);
        let mut first = Vec::new();
        executor.write_all(&mut first).unwrap();
        executor.rewind().unwrap();
        let mut second = Vec::new();
        executor.write_all(&mut second).unwrap();
        assert_eq!(first, second);
    }
}
