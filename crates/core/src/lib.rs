//! Core domain model, validation, and traits.
//! No async and no IO within this crate.

pub mod errors;
pub mod model;
pub mod slug;
pub mod traits;
pub mod validate;

pub use crate::errors::{CoreError, ValidationError};
pub use crate::model::{
    demo_projects, project_link, NewProject, Project, ProjectId, UploadedFile,
    DEFAULT_DESCRIPTION, PLACEHOLDER_TECHNOLOGIES,
};
pub use crate::slug::slugify;
pub use crate::traits::{favorites_first, ProjectStore};
pub use crate::validate::{is_archive_media_type, validate_upload};
