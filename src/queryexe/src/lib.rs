pub mod opiterator;
pub mod query;

pub use query::{execute_sql, Executor, Planner, TranslateAndValidate};
