//! Extended multi-feature (EMF) query engine
//!
//! Evaluates EMF group-by queries: one full scan of the base relation per
//! grouping variable, each with its own condition, accumulating aggregates
//! into a hash table of groups that only the first scan may create. HAVING
//! then filters the groups over their finalized aggregates.

pub mod aggregate;
pub mod catalog;
pub mod cli;
pub mod engine;
pub mod error;
pub mod having;
pub mod mf;
pub mod predicate;
pub mod sales;
pub mod source;
pub mod spec;

// Re-export main types
pub use catalog::{Row, SchemaCatalog, Value};
pub use engine::{EmfContext, EngineConfig, QueryResult};
pub use error::{EmfError, Result};
pub use having::HavingPolicy;
pub use mf::MfStructure;
pub use source::{MemoryRowSource, ParquetRowSource, RecordBatchSource, RowSource};
pub use spec::QuerySpec;
