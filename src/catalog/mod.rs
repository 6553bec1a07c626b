//! Schema catalog and row values
//!
//! The catalog maps attribute names to the scalar types that drive
//! predicate coercion. Rows are attribute-name-to-value mappings.

mod schema;
mod value;

pub use schema::*;
pub use value::*;
