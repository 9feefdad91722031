use std::path::PathBuf;
use thiserror::Error;

use crate::dispatch::Family;
use crate::extract::ExtractError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unrecognized format: no parser handles '{0}' files")]
    UnrecognizedFormat(String),
    #[error("No {0} parser recognizes this file")]
    UnknownVariant(Family),
    #[error("Malformed record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Text extraction failed: {0}")]
    Extraction(#[from] ExtractError),
}

impl ImportError {
    pub(crate) fn malformed(row: usize, reason: impl Into<String>) -> Self {
        ImportError::MalformedRecord {
            row,
            reason: reason.into(),
        }
    }
}
