//! Error types for the EMF engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EmfError>;

/// Main error type for the EMF engine
#[derive(Error, Debug)]
pub enum EmfError {
    #[error("Malformed predicate: {0}")]
    MalformedPredicate(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Invalid specification: {0}")]
    InvalidSpecification(String),

    #[error("HAVING parse error: {0}")]
    HavingParse(String),

    #[error("HAVING evaluation error: {0}")]
    HavingEvaluation(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EmfError {
    /// Whether this error only affects the row being processed
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            EmfError::MalformedPredicate(_)
                | EmfError::TypeMismatch(_)
                | EmfError::UnknownAttribute(_)
                | EmfError::NotImplemented(_)
        )
    }
}
