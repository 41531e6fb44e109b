use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop an import or export before any row is touched, or
/// that roll the whole operation back.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported file format '{0}': only .json documents can be imported")]
    UnsupportedFormat(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Collection {0} not found")]
    CollectionNotFound(i64),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database Error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Why a single imported item was skipped. Recovered inside the import loop
/// and only reported through the skipped count and the log.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("item is not a JSON object")]
    NotAnObject,

    #[error("field '{field}' has an unusable value: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("photo {index} is not valid base64: {source}")]
    InvalidPhoto {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },

    #[error("{0}")]
    Rejected(String),
}

pub type TransferResult<T> = std::result::Result<T, TransferError>;
