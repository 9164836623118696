//! Error types for apply and rollback.
//!
//! Every variant is fatal. Shape, identity and integrity problems carry the
//! expected and observed values so they can be diagnosed without a re-run.

use std::path::PathBuf;
use thiserror::Error;

use dyno_ve_core::{ConfigError, StorageError};

/// Convenient `Result` alias for the apply crate.
pub type ApplyResult<T> = Result<T, ApplyError>;

/// Fatal apply / rollback errors.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Factor grid and base table disagree in shape or axis values.
    #[error(
        "Alignment error ({what}): expected shape {expected_shape:?}, observed {observed_shape:?}; \
         expected rpm {expected_rpm:?}, observed {observed_rpm:?}; \
         expected load {expected_load:?}, observed {observed_load:?}"
    )]
    Alignment {
        /// Which pair of tables was compared.
        what: &'static str,
        /// `(rows, cols)` of the reference.
        expected_shape: (usize, usize),
        /// `(rows, cols)` of the table being checked.
        observed_shape: (usize, usize),
        /// Reference RPM axis.
        expected_rpm: Vec<f64>,
        /// Observed RPM axis.
        observed_rpm: Vec<f64>,
        /// Reference load axis.
        expected_load: Vec<f64>,
        /// Observed load axis.
        observed_load: Vec<f64>,
    },

    /// A recomputed content hash differs from the recorded one.
    #[error("Integrity error: {what} hash mismatch: expected {expected}, got {observed}")]
    Integrity {
        /// Which file was checked.
        what: &'static str,
        /// Hash recorded in the metadata.
        expected: String,
        /// Hash recomputed from disk.
        observed: String,
    },

    /// A clamped factor scales a cell to zero or below, so the apply could
    /// not be undone.
    #[error("Factor {factor}% scales the table to zero or below; cannot invert")]
    NonInvertible {
        /// The offending clamped factor in percent.
        factor: f64,
    },

    /// A table file is not a well-formed efficiency or factor table.
    #[error("Malformed table `{path}`: {message}")]
    TableFormat {
        /// Path of the table.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// Metadata was written by an unknown format version.
    #[error("Unsupported metadata format `{found}`")]
    UnsupportedFormat {
        /// Version tag found in the metadata.
        found: String,
    },

    /// A metadata file holds malformed JSON.
    #[error("Cannot parse metadata `{path}`: {source}")]
    Metadata {
        /// Path of the metadata file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing a file failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Serializing metadata failed.
    #[error("Metadata serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The clamp limit is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApplyError {
    /// Construct an [`ApplyError::TableFormat`].
    pub fn table_format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ApplyError::TableFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Construct an [`ApplyError::Integrity`].
    pub fn integrity(what: &'static str, expected: &str, observed: &str) -> Self {
        ApplyError::Integrity {
            what,
            expected: expected.to_owned(),
            observed: observed.to_owned(),
        }
    }
}
