use crate::model::{NewProject, Project};

/// Backing store for project records.
///
/// Implementations own the collection and the id sequence; `insert` must
/// assign the id and append in one step so concurrent inserts never share an
/// id. No async in core; callers should use spawn_blocking when an
/// implementation does IO.
pub trait ProjectStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All projects, favorites first, otherwise in insertion order.
    fn list(&self) -> Result<Vec<Project>, Self::Error>;

    fn insert(&self, project: NewProject) -> Result<Project, Self::Error>;

    fn find_by_id(&self, id: &str) -> Result<Option<Project>, Self::Error>;

    /// Returns the updated record, or `None` when `id` is unknown.
    fn set_favorite(&self, id: &str, is_favorite: bool) -> Result<Option<Project>, Self::Error>;

    fn len(&self) -> Result<usize, Self::Error>;
}

/// Stable partition putting favorites ahead of everything else.
pub fn favorites_first(projects: &mut [Project]) {
    projects.sort_by_key(|p| !p.is_favorite);
}
