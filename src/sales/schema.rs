//! `sales` table schema

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

/// Arrow schema of the `sales` relation
pub fn sales_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("cust", DataType::Utf8, false),
        Field::new("prod", DataType::Utf8, false),
        Field::new("day", DataType::Int64, false),
        Field::new("month", DataType::Int64, false),
        Field::new("year", DataType::Int64, false),
        Field::new("state", DataType::Utf8, false),
        Field::new("quant", DataType::Int64, false),
        Field::new("date", DataType::Date32, false),
    ]))
}
