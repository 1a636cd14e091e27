//! Policy-checked query execution and catalog introspection.
//!
//! The executor sequences classification, authorization and execution, and
//! guards the size of read results.

pub mod executor;
pub mod introspection;

pub use executor::{ExecutionOutcome, QueryExecutor, RowsOutcome, WriteSummary};
pub use introspection::SecurityInfo;
