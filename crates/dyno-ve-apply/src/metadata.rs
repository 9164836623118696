//! Provenance record for one apply operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use dyno_ve_core::fsio::atomic_write;
use dyno_ve_core::StorageError;

use crate::error::{ApplyError, ApplyResult};

/// Format version tag written into every metadata record.
pub const FORMAT_VERSION: &str = "dyno-ve.apply/1";

/// Suffix appended to an updated table's path to name its metadata file.
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// What one apply consumed and produced.
///
/// Returned from [`Applier::apply`](crate::Applier::apply) and passed back
/// explicitly to [`Applier::rollback`](crate::Applier::rollback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyMetadata {
    /// Always [`FORMAT_VERSION`] for records this crate writes.
    pub format_version: String,
    /// Content hash of the base table file.
    pub base_hash: String,
    /// Content hash of the base table re-rendered in canonical form
    /// (comma-separated, 4 decimals). Rollback compares against this.
    pub base_values_hash: String,
    /// Content hash of the factor table file as consumed.
    pub factor_hash: String,
    /// Content hash of the updated table as rendered.
    pub updated_hash: String,
    /// Apply clamp limit in percent.
    pub clamp_used: f64,
    /// When the apply ran (UTC).
    pub applied_at: DateTime<Utc>,
    /// Base table path.
    pub base_path: PathBuf,
    /// Factor table path, re-hashed before rollback.
    pub factor_path: PathBuf,
    /// Cells whose clamped factor is non-zero.
    pub cells_changed: usize,
    /// Largest |clamped factor| in percent.
    pub max_abs_factor: f64,
}

impl ApplyMetadata {
    /// `<updated><SIDECAR_SUFFIX>`.
    #[must_use]
    pub fn sidecar_path(updated: &Path) -> PathBuf {
        let mut name = updated.as_os_str().to_owned();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Reject records written by another format version.
    pub fn check_version(&self) -> ApplyResult<()> {
        if self.format_version == FORMAT_VERSION {
            Ok(())
        } else {
            Err(ApplyError::UnsupportedFormat {
                found: self.format_version.clone(),
            })
        }
    }

    /// Load and version-check a metadata file.
    pub fn load(path: &Path) -> ApplyResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| StorageError::io(path, e))?;
        let metadata: Self = serde_json::from_slice(&bytes).map_err(|source| ApplyError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        metadata.check_version()?;
        Ok(metadata)
    }

    /// Atomically write as pretty JSON.
    pub fn save(&self, path: &Path) -> ApplyResult<()> {
        atomic_write(path, &serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}
