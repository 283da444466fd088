//! Bundle download and extraction.
//!
//! Archives are streamed to disk chunk by chunk and extracted with
//! `async_zip`, recording the checksum of every file written.

use std::path::{Component, Path};

use tokio::io::AsyncWriteExt;
use url::Url;

use super::checksum::{self, ChecksumMap};
use crate::error::{DependencyError, ErrorExt};

/// Download `url` into `dest`, returning the number of bytes written.
///
/// The body is written to `<dest>.part` and renamed once complete, so
/// `dest` never holds a truncated archive.
pub async fn download_to_file(url: &Url, dest: &Path) -> Result<u64, DependencyError> {
    log::info!("Downloading {}", url);

    let download_error = |e: reqwest::Error| DependencyError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    };

    let mut response = reqwest::get(url.clone()).await.map_err(download_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(DependencyError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .fs_context("creating download directory", parent)?;
    }

    let partial = dest.with_extension("zip.part");
    let mut file = tokio::fs::File::create(&partial)
        .await
        .fs_context("creating download file", &partial)?;

    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(download_error)? {
        file.write_all(&chunk)
            .await
            .fs_context("writing download file", &partial)?;
        written += chunk.len() as u64;
    }
    file.flush().await.fs_context("flushing download file", &partial)?;
    drop(file);

    tokio::fs::rename(&partial, dest)
        .await
        .fs_context("moving download into place", dest)?;

    log::debug!("Downloaded {} bytes to {}", written, dest.display());
    Ok(written)
}

/// Extract a ZIP archive into `dest`, returning the checksum of each file.
///
/// Existing files are overwritten. Entries that would escape `dest`
/// (absolute paths or `..` components) abort the extraction.
pub async fn extract_zip(archive: &Path, dest: &Path) -> Result<ChecksumMap, DependencyError> {
    use async_zip::base::read::mem::ZipFileReader;
    use futures_lite::io::AsyncReadExt as _;

    let extract_error = |reason: String| DependencyError::Extract {
        archive: archive.to_path_buf(),
        reason,
    };

    let data = tokio::fs::read(archive)
        .await
        .fs_context("reading archive", archive)?;
    let reader = ZipFileReader::new(data)
        .await
        .map_err(|e| extract_error(format!("Failed to read ZIP archive: {e}")))?;

    let mut checksums = ChecksumMap::new();

    for i in 0..reader.file().entries().len() {
        let entry = reader
            .file()
            .entries()
            .get(i)
            .ok_or_else(|| extract_error(format!("Failed to get ZIP entry {i}")))?;

        let filename = entry
            .filename()
            .as_str()
            .map_err(|e| extract_error(format!("Invalid filename in ZIP: {e}")))?
            .replace('\\', "/");

        if !is_safe_entry(&filename) {
            return Err(extract_error(format!(
                "Entry '{filename}' points outside the destination"
            )));
        }

        let target = dest.join(&filename);
        let is_dir = entry
            .dir()
            .map_err(|e| extract_error(format!("Failed to inspect entry '{filename}': {e}")))?;
        if is_dir {
            tokio::fs::create_dir_all(&target)
                .await
                .fs_context("creating directory", &target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating directory", parent)?;
        }

        let mut entry_reader = reader
            .reader_with_entry(i)
            .await
            .map_err(|e| extract_error(format!("Failed to open entry '{filename}': {e}")))?;
        let mut content = Vec::new();
        entry_reader
            .read_to_end(&mut content)
            .await
            .map_err(|e| extract_error(format!("Failed to read entry '{filename}': {e}")))?;

        tokio::fs::write(&target, &content)
            .await
            .fs_context("writing extracted file", &target)?;

        checksums.insert(
            filename.trim_start_matches("./").to_string(),
            checksum::checksum_bytes(&content),
        );
    }

    log::debug!(
        "Extracted {} files from {} into {}",
        checksums.len(),
        archive.display(),
        dest.display()
    );
    Ok(checksums)
}

fn is_safe_entry(name: &str) -> bool {
    let path = Path::new(name);
    !name.starts_with('/')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
