//! Synthetic `sales` data generator

use super::sales_schema;
use crate::error::Result;
use crate::source::{into_rows, MemoryRowSource, RecordBatchSource};
use arrow::array::{Date32Array, Int64Array, StringBuilder};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rand::prelude::*;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const CUSTOMERS: [&str; 10] = [
    "Bloom", "Claire", "Dan", "Emily", "Helen", "Knuth", "Mia", "Sam", "Sanjay", "Wally",
];

const PRODUCTS: [&str; 10] = [
    "Apple", "Butter", "Cherry", "Dates", "Eggs", "Fish", "Grapes", "Ham", "Ice", "Jelly",
];

const STATES: [&str; 4] = ["CT", "NJ", "NY", "PA"];

const FIRST_YEAR: i32 = 2016;
const YEARS: i32 = 5;

/// Deterministic generator for the `sales` relation
pub struct SalesGenerator {
    rows: usize,
    rng: StdRng,
}

impl SalesGenerator {
    pub fn new(rows: usize) -> Self {
        Self::with_seed(rows, 42)
    }

    pub fn with_seed(rows: usize, seed: u64) -> Self {
        Self {
            rows,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate the whole relation as one batch
    pub fn generate(&mut self) -> Result<RecordBatch> {
        let count = self.rows;
        let mut cust = StringBuilder::new();
        let mut prod = StringBuilder::new();
        let mut state = StringBuilder::new();
        let mut day = Vec::with_capacity(count);
        let mut month = Vec::with_capacity(count);
        let mut year = Vec::with_capacity(count);
        let mut quant = Vec::with_capacity(count);
        let mut date = Vec::with_capacity(count);

        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();

        for _ in 0..count {
            cust.append_value(CUSTOMERS[self.rng.gen_range(0..CUSTOMERS.len())]);
            prod.append_value(PRODUCTS[self.rng.gen_range(0..PRODUCTS.len())]);
            state.append_value(STATES[self.rng.gen_range(0..STATES.len())]);

            let d = self.random_date();
            day.push(d.day() as i64);
            month.push(d.month() as i64);
            year.push(d.year() as i64);
            date.push((d - epoch).num_days() as i32);

            quant.push(self.rng.gen_range(1..=1000));
        }

        let batch = RecordBatch::try_new(
            sales_schema(),
            vec![
                Arc::new(cust.finish()),
                Arc::new(prod.finish()),
                Arc::new(Int64Array::from(day)),
                Arc::new(Int64Array::from(month)),
                Arc::new(Int64Array::from(year)),
                Arc::new(state.finish()),
                Arc::new(Int64Array::from(quant)),
                Arc::new(Date32Array::from(date)),
            ],
        )?;
        Ok(batch)
    }

    /// Generate into an Arrow batch source
    pub fn generate_source(&mut self) -> Result<RecordBatchSource> {
        let batch = self.generate()?;
        Ok(RecordBatchSource::new(sales_schema(), vec![batch]))
    }

    /// Generate into plain in-memory rows
    pub fn generate_rows(&mut self) -> Result<MemoryRowSource> {
        let batch = self.generate()?;
        into_rows(batch).collect::<Result<Vec<_>>>().map(MemoryRowSource::new)
    }

    /// Generate and write a Snappy-compressed Parquet file
    pub fn write_parquet(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let batch = self.generate()?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, sales_schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        let file_size = std::fs::metadata(path)?.len();
        info!(
            rows = batch.num_rows(),
            path = %path.display(),
            bytes = file_size,
            "wrote sales data"
        );
        Ok(())
    }

    fn random_date(&mut self) -> NaiveDate {
        let year = FIRST_YEAR + self.rng.gen_range(0..YEARS);
        let month = self.rng.gen_range(1..=12);
        // Day 28 exists in every month
        let day = self.rng.gen_range(1..=28);
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Value;
    use crate::source::{ParquetRowSource, RowSource};

    #[test]
    fn test_same_seed_same_data() {
        let a = SalesGenerator::new(200).generate().unwrap();
        let b = SalesGenerator::new(200).generate().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.num_rows(), 200);

        let c = SalesGenerator::with_seed(200, 7).generate().unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_date_parts_agree() {
        let rows = SalesGenerator::new(50).generate_rows().unwrap();
        for row in rows.rows() {
            let Some(Value::Date(d)) = row.get("date") else {
                panic!("date column missing");
            };
            assert_eq!(row.get("year"), Some(&Value::Int(d.year() as i64)));
            assert_eq!(row.get("month"), Some(&Value::Int(d.month() as i64)));
            assert_eq!(row.get("day"), Some(&Value::Int(d.day() as i64)));
        }
    }

    #[test]
    fn test_write_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("sales.parquet");
        SalesGenerator::new(100).write_parquet(&path).unwrap();

        let source = ParquetRowSource::try_new(&path).unwrap();
        assert_eq!(source.scan().unwrap().count(), 100);
    }
}
