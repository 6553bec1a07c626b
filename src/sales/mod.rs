//! The `sales` relation: schema and synthetic data

mod generator;
mod schema;

pub use generator::*;
pub use schema::*;
