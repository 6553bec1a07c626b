//! Arrow record batches as a row source

use super::{RowIter, RowSource};
use crate::catalog::{Row, SchemaCatalog, Value};
use crate::error::{EmfError, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, SchemaRef, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use arrow::temporal_conversions::{date32_to_datetime, date64_to_datetime};
use std::sync::Arc;

/// Row source over batches already in memory
#[derive(Debug, Clone)]
pub struct RecordBatchSource {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl RecordBatchSource {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    /// Take the schema from the first batch
    pub fn try_new(batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = match batches.first() {
            Some(batch) => batch.schema(),
            None => Arc::new(arrow::datatypes::Schema::empty()),
        };
        Ok(Self { schema, batches })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Attribute types derived from the batch schema
    pub fn catalog(&self) -> Result<SchemaCatalog> {
        SchemaCatalog::from_arrow_schema(&self.schema)
    }
}

impl RowSource for RecordBatchSource {
    fn scan(&self) -> Result<RowIter<'_>> {
        Ok(Box::new(self.batches.iter().cloned().flat_map(into_rows)))
    }

    fn row_count(&self) -> Option<usize> {
        Some(self.batches.iter().map(|b| b.num_rows()).sum())
    }
}

/// Convert every row of a batch, in order
pub fn into_rows(batch: RecordBatch) -> impl Iterator<Item = Result<Row>> {
    (0..batch.num_rows()).map(move |i| row_at(&batch, i))
}

/// Build the row at `index`, keyed by field name
pub fn row_at(batch: &RecordBatch, index: usize) -> Result<Row> {
    let schema = batch.schema();
    let mut row = Row::with_capacity(batch.num_columns());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        row.insert(field.name().clone(), value_at(column.as_ref(), index)?);
    }
    Ok(row)
}

/// Read one cell as a `Value`
pub fn value_at(array: &dyn Array, index: usize) -> Result<Value> {
    if array.is_null(index) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Utf8 => Value::Str(array.as_string::<i32>().value(index).to_string()),
        DataType::LargeUtf8 => Value::Str(array.as_string::<i64>().value(index).to_string()),
        DataType::Int8 => Value::Int(array.as_primitive::<Int8Type>().value(index) as i64),
        DataType::Int16 => Value::Int(array.as_primitive::<Int16Type>().value(index) as i64),
        DataType::Int32 => Value::Int(array.as_primitive::<Int32Type>().value(index) as i64),
        DataType::Int64 => Value::Int(array.as_primitive::<Int64Type>().value(index)),
        DataType::UInt8 => Value::Int(array.as_primitive::<UInt8Type>().value(index) as i64),
        DataType::UInt16 => Value::Int(array.as_primitive::<UInt16Type>().value(index) as i64),
        DataType::UInt32 => Value::Int(array.as_primitive::<UInt32Type>().value(index) as i64),
        DataType::UInt64 => {
            let v = array.as_primitive::<UInt64Type>().value(index);
            Value::Int(i64::try_from(v).map_err(|_| {
                EmfError::TypeMismatch(format!("{} does not fit in a signed integer", v))
            })?)
        }
        DataType::Float32 => Value::Float(array.as_primitive::<Float32Type>().value(index) as f64),
        DataType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(index)),
        DataType::Date32 => {
            let days = array.as_primitive::<Date32Type>().value(index);
            let date = date32_to_datetime(days)
                .ok_or_else(|| EmfError::TypeMismatch(format!("invalid date32 {}", days)))?;
            Value::Date(date.date())
        }
        DataType::Date64 => {
            let millis = array.as_primitive::<Date64Type>().value(index);
            let date = date64_to_datetime(millis)
                .ok_or_else(|| EmfError::TypeMismatch(format!("invalid date64 {}", millis)))?;
            Value::Date(date.date())
        }
        other => {
            return Err(EmfError::NotImplemented(format!("reading {} columns", other)))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Date32Array, Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use chrono::NaiveDate;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("cust", DataType::Utf8, true),
            Field::new("quant", DataType::Int32, false),
            Field::new("price", DataType::Float64, false),
            Field::new("date", DataType::Date32, false),
        ]));
        // 19723 days after the epoch is 2024-01-01
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("Sam"), None])),
                Arc::new(Int32Array::from(vec![4, 9])),
                Arc::new(Float64Array::from(vec![1.5, 2.0])),
                Arc::new(Date32Array::from(vec![19723, 19724])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rows_from_batch() {
        let source = RecordBatchSource::try_new(vec![batch()]).unwrap();
        let rows: Vec<Row> = source.scan().unwrap().map(|r| r.unwrap()).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("cust"), Some(&Value::from("Sam")));
        assert_eq!(rows[0].get("quant"), Some(&Value::Int(4)));
        assert_eq!(rows[0].get("price"), Some(&Value::Float(1.5)));
        assert_eq!(
            rows[0].get("date"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
        );
        assert_eq!(rows[1].get("cust"), Some(&Value::Null));
        assert_eq!(source.row_count(), Some(2));
    }

    #[test]
    fn test_catalog_from_schema() {
        let source = RecordBatchSource::try_new(vec![batch()]).unwrap();
        let catalog = source.catalog().unwrap();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.lookup("quant").unwrap().is_numeric());
    }
}
