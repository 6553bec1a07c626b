//! Parquet files as a row source
//!
//! Each scan re-opens the files and streams them batch by batch, so only one
//! batch is resident at a time regardless of file size.

use super::{into_rows, RowIter, RowSource};
use crate::catalog::SchemaCatalog;
use crate::error::{EmfError, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Rows per batch when streaming
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Row source reading a Parquet file or a directory of them
pub struct ParquetRowSource {
    schema: SchemaRef,
    files: Vec<PathBuf>,
    batch_size: usize,
}

impl fmt::Debug for ParquetRowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParquetRowSource")
            .field("files", &self.files)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl ParquetRowSource {
    /// Open a single file, or every `.parquet` file in a directory
    pub fn try_new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let files = if path.is_dir() {
            find_parquet_files(path)?
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(EmfError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Path does not exist: {}", path.display()),
            )));
        };

        if files.is_empty() {
            return Err(EmfError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("No Parquet files found in: {}", path.display()),
            )));
        }

        let file = File::open(&files[0])?;
        let schema = ParquetRecordBatchReaderBuilder::try_new(file)?.schema().clone();

        Ok(Self {
            schema,
            files,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Attribute types derived from the file schema
    pub fn catalog(&self) -> Result<SchemaCatalog> {
        SchemaCatalog::from_arrow_schema(&self.schema)
    }

    fn open(&self, path: &Path) -> Result<ParquetRecordBatchReader> {
        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(self.batch_size)
            .build()?;
        Ok(reader)
    }

    fn batches(&self) -> impl Iterator<Item = Result<RecordBatch>> + '_ {
        self.files.iter().flat_map(move |path| {
            let batches: Box<dyn Iterator<Item = Result<RecordBatch>>> = match self.open(path) {
                Ok(reader) => Box::new(reader.map(|batch| batch.map_err(EmfError::from))),
                Err(e) => Box::new(std::iter::once(Err(e))),
            };
            batches
        })
    }
}

impl RowSource for ParquetRowSource {
    fn scan(&self) -> Result<RowIter<'_>> {
        let rows = self.batches().flat_map(|batch| {
            let rows: RowIter<'static> = match batch {
                Ok(batch) => Box::new(into_rows(batch)),
                Err(e) => Box::new(std::iter::once(Err(e))),
            };
            rows
        });
        Ok(Box::new(rows))
    }
}

/// Every `.parquet` file directly inside `dir`, sorted for deterministic order
fn find_parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "parquet") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
