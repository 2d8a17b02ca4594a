use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Generic I/O error reading or writing the sheet file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse/serialize failure.
    #[error("Sheet format error: {0}")]
    Csv(#[from] csv::Error),

    /// A row or header does not match the canonical schema. Mismatching
    /// sheets are rejected, never coerced.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A positional index past the end of the sheet.
    #[error("Row index out of range: {0}")]
    RowOutOfRange(usize),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
