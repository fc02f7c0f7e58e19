use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use folio_core::{model::Project, CoreError};
use thiserror::Error;
use tracing::{debug, warn};

/// Entries whose names start with this are never listed.
const HIDDEN_MARKER: char = '.';

#[derive(Debug, Error)]
pub enum FilesError {
    #[error("project directory missing: {0}")]
    DirectoryMissing(String),
    #[error("file not found: {0}")]
    FileMissing(String),
    #[error("path escapes the project directory: {0}")]
    PathTraversal(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<FilesError> for CoreError {
    fn from(err: FilesError) -> Self {
        match err {
            FilesError::DirectoryMissing(slug) => CoreError::DirectoryMissing(slug),
            // Traversal attempts look exactly like a missing file to the caller.
            FilesError::FileMissing(name) | FilesError::PathTraversal(name) => {
                CoreError::FileMissing(name)
            }
            FilesError::Io(msg) => CoreError::Io(msg),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Canonical path, guaranteed to sit under the project directory.
    pub path: PathBuf,
    pub content_type: String,
}

/// Read access to extracted bundles under one projects root.
#[derive(Clone, Debug)]
pub struct FileBrowser {
    root: PathBuf,
}

impl FileBrowser {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a project's bundle is (or will be) extracted.
    pub fn project_dir(&self, project: &Project) -> PathBuf {
        self.dir_for_slug(&project.slug())
    }

    pub fn dir_for_slug(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    /// Top-level entry names of the project directory, hidden entries
    /// excluded, in the order the filesystem reports them.
    pub fn list_files(&self, project: &Project) -> Result<Vec<String>, FilesError> {
        let dir = self.project_dir(project);
        if !dir.is_dir() {
            return Err(FilesError::DirectoryMissing(project.slug()));
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| FilesError::Io(e.to_string()))? {
            let entry = entry.map_err(|e| FilesError::Io(e.to_string()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(HIDDEN_MARKER) {
                continue;
            }
            names.push(name);
        }
        debug!(project = %project.id, count = names.len(), "listed project files");
        Ok(names)
    }

    /// Resolves `filename` inside the project directory.
    ///
    /// The name is client supplied. It must be relative and free of `..`,
    /// and after symlinks are resolved the file must still live under the
    /// project directory.
    pub fn resolve_file(
        &self,
        project: &Project,
        filename: &str,
    ) -> Result<ResolvedFile, FilesError> {
        check_relative(filename)?;
        let dir = self.project_dir(project);
        let base = dir
            .canonicalize()
            .map_err(|err| lookup_failed(filename, &err))?;
        let path = base
            .join(filename)
            .canonicalize()
            .map_err(|err| lookup_failed(filename, &err))?;
        if !path.starts_with(&base) {
            warn!(project = %project.id, filename, "rejected file outside project directory");
            return Err(FilesError::PathTraversal(filename.to_owned()));
        }
        if !path.is_file() {
            return Err(FilesError::FileMissing(filename.to_owned()));
        }
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_owned();
        Ok(ResolvedFile { path, content_type })
    }
}

/// A path that cannot be resolved (absent, or running through a regular
/// file) is reported as a missing file.
fn lookup_failed(filename: &str, err: &io::Error) -> FilesError {
    debug!(filename, error = %err, "file lookup failed");
    FilesError::FileMissing(filename.to_owned())
}

fn check_relative(filename: &str) -> Result<(), FilesError> {
    if filename.is_empty() || filename.contains('\0') {
        return Err(FilesError::FileMissing(filename.to_owned()));
    }
    let escapes = Path::new(filename)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    // Backslash separators are not components on unix but are on windows.
    if escapes || filename.split(['/', '\\']).any(|seg| seg == "..") {
        return Err(FilesError::PathTraversal(filename.to_owned()));
    }
    Ok(())
}
