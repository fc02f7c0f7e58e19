//! Process-lifetime project store. Nothing survives a restart.

use std::convert::Infallible;

use folio_core::{
    model::{NewProject, Project},
    traits::{favorites_first, ProjectStore},
};
use parking_lot::RwLock;
use tracing::debug;

const ID_PREFIX: &str = "p";

pub struct EphemeralStore {
    inner: RwLock<Inner>,
}

struct Inner {
    projects: Vec<Project>,
    next_id: u64,
}

impl EphemeralStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with [`folio_core::demo_projects`].
    #[must_use]
    pub fn with_demo_projects() -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for project in folio_core::demo_projects() {
                inner.push(project);
            }
        }
        store
    }
}

impl Inner {
    fn push(&mut self, project: NewProject) -> Project {
        let id = format!("{ID_PREFIX}{}", self.next_id);
        self.next_id += 1;
        let stored = project.into_project(id);
        self.projects.push(stored.clone());
        stored
    }
}

impl Default for EphemeralStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                projects: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

impl ProjectStore for EphemeralStore {
    type Error = Infallible;

    fn list(&self) -> Result<Vec<Project>, Self::Error> {
        let mut projects = self.inner.read().projects.clone();
        favorites_first(&mut projects);
        Ok(projects)
    }

    fn insert(&self, project: NewProject) -> Result<Project, Self::Error> {
        let stored = self.inner.write().push(project);
        debug!(id = %stored.id, title = %stored.title, "project inserted");
        Ok(stored)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Project>, Self::Error> {
        let inner = self.inner.read();
        Ok(inner.projects.iter().find(|p| p.id == id).cloned())
    }

    fn set_favorite(&self, id: &str, is_favorite: bool) -> Result<Option<Project>, Self::Error> {
        let mut inner = self.inner.write();
        Ok(inner.projects.iter_mut().find(|p| p.id == id).map(|p| {
            p.is_favorite = is_favorite;
            p.clone()
        }))
    }

    fn len(&self) -> Result<usize, Self::Error> {
        Ok(self.inner.read().projects.len())
    }
}
