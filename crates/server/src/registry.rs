//! The ingestion pipeline and the read paths that sit on top of it.

use std::sync::Arc;

use folio_core::{
    model::{NewProject, Project, UploadedFile},
    slug::slugify,
    traits::ProjectStore,
    validate::validate_upload,
    CoreError, ValidationError,
};
use folio_files::{FileBrowser, ResolvedFile};
use folio_ingest::{ingest, remove_file_best_effort};
use tracing::{debug, info, warn};

/// A project submission as received from a client.
#[derive(Clone, Debug, Default)]
pub struct Upload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub file: Option<UploadedFile>,
}

/// Sole creator of projects. Everything else reads through it.
pub struct Registry<S> {
    store: Arc<S>,
    browser: Arc<FileBrowser>,
}

impl<S> Clone for Registry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            browser: Arc::clone(&self.browser),
        }
    }
}

fn storage_error<E: std::error::Error>(err: E) -> CoreError {
    CoreError::Storage(err.to_string())
}

impl<S> Registry<S>
where
    S: ProjectStore + Send + Sync + 'static,
{
    pub fn new(store: S, browser: FileBrowser) -> Self {
        Self {
            store: Arc::new(store),
            browser: Arc::new(browser),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn browser(&self) -> &FileBrowser {
        &self.browser
    }

    pub fn list_all(&self) -> Result<Vec<Project>, CoreError> {
        self.store.list().map_err(storage_error)
    }

    pub fn project(&self, id: &str) -> Result<Project, CoreError> {
        self.store
            .find_by_id(id)
            .map_err(storage_error)?
            .ok_or_else(|| CoreError::NotFound(id.to_owned()))
    }

    /// Validates, extracts and records an upload. Blocks on disk IO.
    ///
    /// The uploaded temp file is gone when this returns, whatever the outcome.
    pub fn register(&self, upload: Upload) -> Result<Project, CoreError> {
        let Upload {
            name,
            description,
            file,
        } = upload;
        let (name, file) = match (validate_upload(name.as_deref(), file.as_ref()), file) {
            (Ok(name), Some(file)) => (name.to_owned(), file),
            (result, file) => {
                if let Some(file) = &file {
                    remove_file_best_effort(&file.path);
                }
                let err = result.err().unwrap_or(ValidationError::MissingFile);
                debug!(error = %err, "upload rejected");
                return Err(err.into());
            }
        };

        let slug = slugify(&name);
        self.warn_on_slug_collision(&slug)?;
        let destination = self.browser.dir_for_slug(&slug);
        let report = ingest(&file.path, &destination)?;

        let project = self
            .store
            .insert(NewProject::from_upload(&name, description.as_deref()))
            .map_err(storage_error)?;
        info!(
            id = %project.id,
            title = %project.title,
            archive = %file.original_name,
            files = report.files,
            destination = %destination.display(),
            "project registered"
        );
        Ok(project)
    }

    // Two titles with the same slug share one directory; the later upload
    // writes over the earlier one.
    fn warn_on_slug_collision(&self, slug: &str) -> Result<(), CoreError> {
        let projects = self.store.list().map_err(storage_error)?;
        if let Some(existing) = projects.iter().find(|p| p.slug() == slug) {
            warn!(
                slug,
                existing = %existing.id,
                "slug already used by another project; extracting over its directory"
            );
        }
        Ok(())
    }

    pub fn set_favorite(&self, id: &str, is_favorite: bool) -> Result<Project, CoreError> {
        let project = self
            .store
            .set_favorite(id, is_favorite)
            .map_err(storage_error)?
            .ok_or_else(|| CoreError::NotFound(id.to_owned()))?;
        debug!(id, is_favorite, "favorite updated");
        Ok(project)
    }

    pub fn list_files(&self, id: &str) -> Result<Vec<String>, CoreError> {
        let project = self.project(id)?;
        Ok(self.browser.list_files(&project)?)
    }

    pub fn resolve_file(&self, id: &str, filename: &str) -> Result<ResolvedFile, CoreError> {
        let project = self.project(id)?;
        Ok(self.browser.resolve_file(&project, filename)?)
    }
}
