//! Query results

use super::ScanStats;
use crate::catalog::Value;
use crate::error::Result;
use crate::having::HavingStats;
use crate::mf::ResultRow;
use arrow::array::{ArrayRef, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;
use std::time::Duration;

/// Result of executing an EMF query
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Output column names, `select_attrs` order
    pub columns: Vec<String>,
    /// One row per retained group, sorted by grouping attributes
    pub rows: Vec<ResultRow>,
    /// One entry per grouping variable
    pub scan_stats: Vec<ScanStats>,
    pub having_stats: HavingStats,
    pub metrics: QueryMetrics,
}

/// Query execution metrics
#[derive(Debug, Clone, Default)]
pub struct QueryMetrics {
    /// Time spent in the grouping-variable scans
    pub scan_time: Duration,
    /// Time spent applying HAVING
    pub having_time: Duration,
    /// Time spent projecting and sorting
    pub materialize_time: Duration,
    /// Total time
    pub total_time: Duration,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one output column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        if !self.columns.iter().any(|c| c == name) {
            return None;
        }
        Some(
            self.rows
                .iter()
                .map(|row| row.get(name).unwrap_or(&Value::Null))
                .collect(),
        )
    }

    /// Convert to a single Arrow batch
    ///
    /// A column holding only integers becomes Int64, one holding only numbers
    /// becomes Float64, anything else (including an all-null column) is Utf8.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());

        for name in &self.columns {
            let values: Vec<&Value> = self
                .rows
                .iter()
                .map(|row| row.get(name).unwrap_or(&Value::Null))
                .collect();
            let data_type = column_type(&values);
            fields.push(Field::new(name, data_type.clone(), true));
            arrays.push(build_array(&data_type, &values));
        }

        let schema = Arc::new(Schema::new(fields));
        Ok(RecordBatch::try_new(schema, arrays)?)
    }
}

fn column_type(values: &[&Value]) -> DataType {
    let present: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();
    if present.is_empty() {
        DataType::Utf8
    } else if present.iter().all(|v| matches!(v, Value::Int(_))) {
        DataType::Int64
    } else if present.iter().all(|v| v.is_numeric()) {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

fn build_array(data_type: &DataType, values: &[&Value]) -> ArrayRef {
    match data_type {
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(values.len());
            for v in values {
                builder.append_option(v.as_i64());
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(values.len());
            for v in values {
                builder.append_option(v.as_f64());
            }
            Arc::new(builder.finish())
        }
        _ => {
            let mut builder = StringBuilder::new();
            for v in values {
                if v.is_null() {
                    builder.append_null();
                } else {
                    builder.append_value(v.to_string());
                }
            }
            Arc::new(builder.finish())
        }
    }
}
