//! Row sources
//!
//! The engine makes one full pass over its source per grouping variable, so a
//! source must be re-iterable: every call to `scan` starts from the first row
//! and yields the same data.

mod batch;
mod parquet_file;

pub use batch::*;
pub use parquet_file::*;

use crate::catalog::Row;
use crate::error::Result;
use std::fmt;

/// A single pass over a source's rows
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Row>> + 'a>;

/// Re-iterable provider of `sales`-shaped rows
pub trait RowSource: fmt::Debug {
    /// Start an independent full iteration
    fn scan(&self) -> Result<RowIter<'_>>;

    /// Row count when it is known without scanning
    fn row_count(&self) -> Option<usize> {
        None
    }
}

/// In-memory row source
#[derive(Debug, Clone, Default)]
pub struct MemoryRowSource {
    rows: Vec<Row>,
}

impl MemoryRowSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

impl FromIterator<Row> for MemoryRowSource {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl RowSource for MemoryRowSource {
    fn scan(&self) -> Result<RowIter<'_>> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }

    fn row_count(&self) -> Option<usize> {
        Some(self.rows.len())
    }
}

impl<S: RowSource + ?Sized> RowSource for &S {
    fn scan(&self) -> Result<RowIter<'_>> {
        (**self).scan()
    }

    fn row_count(&self) -> Option<usize> {
        (**self).row_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Value;

    #[test]
    fn test_memory_source_rescans() {
        let source: MemoryRowSource = vec![
            Row::new().with("cust", "A").with("quant", 1i64),
            Row::new().with("cust", "B").with("quant", 2i64),
        ]
        .into_iter()
        .collect();

        let first: Vec<Row> = source.scan().unwrap().map(|r| r.unwrap()).collect();
        let second: Vec<Row> = source.scan().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].get("quant"), Some(&Value::Int(2)));
        assert_eq!(source.row_count(), Some(2));
    }
}
