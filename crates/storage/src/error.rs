//! Error types for the storage crate

use hermes_core::FieldError;
use thiserror::Error;

/// Backend read/write failures
///
/// A failed `save` leaves the backend as it was before the call.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Stored record is malformed: {0}")]
    Field(#[from] FieldError),

    #[error("Schema mismatch: {0}")]
    Schema(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Invalid table or container name {0:?}: expected ASCII letters and digits")]
    InvalidName(String),

    #[error("Backend is closed")]
    Closed,

    #[error("Backend was opened read-only")]
    ReadOnly,

    #[error("Buffer size must be greater than zero")]
    InvalidBufferSize,

    #[error("Unsupported storage backend: {0}")]
    UnsupportedBackend(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
