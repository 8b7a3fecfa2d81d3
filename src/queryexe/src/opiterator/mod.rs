use common::{EmberError, SchemaMapping, Tuple};

mod aggregate;
mod append;
mod distinct;
mod filter;
mod join;
mod project;
mod scan;
mod sort;
mod tuple_iterator;

pub use aggregate::Aggregate;
pub use append::LiteralAppend;
pub use distinct::Distinct;
pub use filter::Filter;
pub use join::Join;
pub use project::Project;
pub use scan::CsvScan;
pub use sort::Sort;
pub use tuple_iterator::TupleIterator;

/// The pull interface every physical operator implements.
///
/// Operators are single-threaded and stateful; each owns its children and
/// is responsible for cascading `rewind` and for teardown on drop. The
/// schema mapping returned by `schema()` exactly describes the tuples
/// `next()` produces: every produced tuple has arity `schema().size()`.
pub trait OpIterator {
    /// Returns the next output tuple, or `None` at end of stream.
    fn next(&mut self) -> Result<Option<Tuple>, EmberError>;

    /// Places the operator back at the beginning of its output sequence.
    ///
    /// Idempotent. Streaming operators cascade to their children; blocking
    /// operators rewind their materialized buffer without re-reading the
    /// child.
    fn rewind(&mut self) -> Result<(), EmberError>;

    /// The name-to-index contract for this operator's output.
    fn schema(&self) -> &SchemaMapping;
}
