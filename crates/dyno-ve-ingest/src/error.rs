//! Error types for log ingestion.
//!
//! Only problems that make the whole source unusable are errors. Individual
//! rows that fail validation are never errors; they are tallied as
//! [`RejectReason`](crate::record::RejectReason)s and skipped.

use std::path::PathBuf;
use thiserror::Error;

use crate::dialect::Dialect;
use crate::field::Field;

/// Convenient `Result` alias for ingestion.
pub type IngestResult<T> = Result<T, IngestError>;

/// Fatal ingestion errors.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A required logical column could not be resolved from the header.
    #[error(
        "Schema error: no column for required field `{field}` in {dialect} log \
         (headers: {headers:?})"
    )]
    Schema {
        /// The unresolved logical field.
        field: Field,
        /// Dialect used for resolution.
        dialect: Dialect,
        /// Normalized header names that were searched.
        headers: Vec<String>,
    },

    /// None of a group of alternative columns could be resolved.
    #[error(
        "Schema error: none of {alternatives:?} resolvable in {dialect} log \
         (headers: {headers:?})"
    )]
    SchemaAlternatives {
        /// The logical fields of which at least one is required.
        alternatives: Vec<Field>,
        /// Dialect used for resolution.
        dialect: Dialect,
        /// Normalized header names that were searched.
        headers: Vec<String>,
    },

    /// The log file could not be read.
    #[error("I/O error reading `{path}`: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error without path context (reader sources).
    #[error("I/O error: {0}")]
    Read(#[from] std::io::Error),

    /// The delimited header row could not be read.
    #[error("Malformed header row: {0}")]
    Header(#[from] csv::Error),
}

impl IngestError {
    /// Construct an [`IngestError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }
}
