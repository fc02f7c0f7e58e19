//! Archive ingestion: unpack an uploaded zip into a project directory.
//!
//! The contract is extract-or-clean-up. On success the destination holds the
//! archive's tree; on failure the destination is removed. In both cases the
//! uploaded archive is deleted. Decompression itself is the `zip` crate's job.
//!
//! Extracting into a directory that already exists writes over it in place:
//! files present in the archive replace same-named files on disk and other
//! files are left alone. A failed extraction removes the whole directory,
//! earlier content included.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use folio_core::CoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(String),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("archive entry escapes the destination: {0}")]
    UnsafeEntry(String),
}

impl From<IngestError> for CoreError {
    fn from(err: IngestError) -> Self {
        CoreError::ExtractionFailed(err.to_string())
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct IngestReport {
    pub destination: PathBuf,
    pub files: u64,
    pub directories: u64,
    #[serde(rename = "totalBytes")]
    pub total_bytes: u64,
}

/// Extracts `archive` into `destination`, then removes `archive`.
///
/// On failure `destination` is removed before the error is returned.
/// Cleanup failures are logged and never replace the extraction result.
pub fn ingest(archive: &Path, destination: &Path) -> Result<IngestReport, IngestError> {
    let result = extract(archive, destination);
    match &result {
        Ok(report) => info!(
            destination = %destination.display(),
            files = report.files,
            bytes = report.total_bytes,
            "archive extracted"
        ),
        Err(err) => {
            error!(archive = %archive.display(), error = %err, "archive extraction failed");
            remove_dir_best_effort(destination);
        }
    }
    remove_file_best_effort(archive);
    result
}

fn extract(archive: &Path, destination: &Path) -> Result<IngestReport, IngestError> {
    let file = File::open(archive).map_err(|e| IngestError::Io(e.to_string()))?;
    let mut zip = ZipArchive::new(file).map_err(|e| IngestError::Archive(e.to_string()))?;
    fs::create_dir_all(destination).map_err(|e| IngestError::Io(e.to_string()))?;

    let mut report = IngestReport {
        destination: destination.to_path_buf(),
        ..IngestReport::default()
    };
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| IngestError::Archive(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(IngestError::UnsafeEntry(entry.name().to_owned()));
        };
        let target = destination.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| IngestError::Io(e.to_string()))?;
            report.directories += 1;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| IngestError::Io(e.to_string()))?;
        }
        let mut out = File::create(&target).map_err(|e| IngestError::Io(e.to_string()))?;
        let written = io::copy(&mut entry, &mut out).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => IngestError::Archive(e.to_string()),
            _ => IngestError::Io(e.to_string()),
        })?;
        debug!(entry = %target.display(), bytes = written, "extracted entry");
        report.files += 1;
        report.total_bytes += written;
    }
    Ok(report)
}

/// Removes a temp upload, swallowing failures.
pub fn remove_file_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove temp upload"),
    }
}

fn remove_dir_best_effort(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(
            path = %path.display(),
            error = %err,
            "failed to remove partially extracted directory"
        ),
    }
}
