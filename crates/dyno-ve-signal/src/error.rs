//! Error types for the preview pipeline.

use thiserror::Error;

use dyno_ve_core::{ConfigError, StorageError};
use dyno_ve_ingest::IngestError;

/// Convenient `Result` alias for the signal crate.
pub type SignalResult<T> = Result<T, SignalError>;

/// Fatal preview pipeline errors.
#[derive(Debug, Error)]
pub enum SignalError {
    /// No record survived validation and the weight floor.
    #[error(
        "No usable samples: {rows_read} rows read, {rows_rejected} rejected, \
         {rows_idle} below the weight floor"
    )]
    EmptyInput {
        /// Data rows seen by ingestion.
        rows_read: usize,
        /// Rows rejected by validation.
        rows_rejected: usize,
        /// Accepted rows excluded as idle.
        rows_idle: usize,
    },

    /// Ingestion failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Writing an export failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Serializing the preview summary failed.
    #[error("Summary serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
