//! Content hashing and crash-safe file replacement.

use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;

use crate::error::StorageError;

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Read `path` and return its bytes together with their content hash.
pub fn read_hashed(path: &Path) -> Result<(Vec<u8>, String), StorageError> {
    let bytes = std::fs::read(path).map_err(|e| StorageError::io(path, e))?;
    let hash = content_hash(&bytes);
    Ok((bytes, hash))
}

/// Content hash of the file at `path`.
pub fn hash_file(path: &Path) -> Result<String, StorageError> {
    read_hashed(path).map(|(_, hash)| hash)
}

/// Write `bytes` to `path` via a temporary file in the same directory,
/// fsync it, then rename it over the destination.
///
/// A crash leaves either the old file or the complete new one, never a
/// partial write.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StorageError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| StorageError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "atomic write complete");
    Ok(())
}
