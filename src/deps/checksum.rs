//! MD5 checksums and the per-bundle checksum side-file.
//!
//! The side-file is a JSON object mapping each extracted file's path
//! (relative to the bundle directory, `/`-separated) to its lowercase hex
//! MD5 digest. It is only written after a complete extraction, so its
//! presence marks a bundle whose download finished.

use std::collections::BTreeMap;
use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::DependencyError;

/// Relative file path to hex digest, sorted by path
pub type ChecksumMap = BTreeMap<String, String>;

/// Hex MD5 digest of a byte slice
pub fn checksum_bytes(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Hex MD5 digest of a file, or `None` if it cannot be read.
///
/// An unreadable file is reported as "no checksum" so callers treat it
/// as invalid rather than failing the whole validation.
pub async fn file_checksum(path: &Path) -> Option<String> {
    match tokio::fs::read(path).await {
        Ok(data) => Some(checksum_bytes(&data)),
        Err(e) => {
            log::debug!("Cannot checksum {}: {}", path.display(), e);
            None
        }
    }
}

/// Load a side-file; missing or unparsable files yield `None`.
pub async fn load(path: &Path) -> Option<ChecksumMap> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&contents) {
        Ok(map) => Some(map),
        Err(e) => {
            log::warn!("Ignoring corrupt checksum file {}: {}", path.display(), e);
            None
        }
    }
}

/// Write a side-file atomically (temp file, sync, rename).
pub async fn persist(path: &Path, checksums: &ChecksumMap) -> Result<(), DependencyError> {
    let persist_error = |reason: String| DependencyError::Persist {
        path: path.to_path_buf(),
        reason,
    };

    let json = serde_json::to_string_pretty(checksums)
        .map_err(|e| persist_error(format!("Failed to serialize checksums: {e}")))?;

    let temp_path = path.with_extension("md5.tmp");
    {
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| persist_error(format!("Failed to create temp file: {e}")))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| persist_error(format!("Failed to write temp file: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| persist_error(format!("Failed to sync file: {e}")))?;
    }

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| persist_error(format!("Failed to rename temp file: {e}")))?;

    log::debug!("Recorded {} checksums in {}", checksums.len(), path.display());
    Ok(())
}

/// Remove a side-file, ignoring a missing one.
pub async fn remove(path: &Path) -> Result<(), DependencyError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DependencyError::Persist {
            path: path.to_path_buf(),
            reason: format!("Failed to remove stale checksum file: {e}"),
        }),
    }
}
