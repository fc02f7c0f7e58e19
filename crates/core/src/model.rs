use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::slug::slugify;

pub type ProjectId = String;

pub const DEFAULT_DESCRIPTION: &str = "No description provided.";

/// Tags attached to every ingested bundle; no content analysis is done.
pub const PLACEHOLDER_TECHNOLOGIES: &[&str] = &["HTML", "CSS", "JS", "ZIP"];

/// URL prefix under which extracted bundles are served.
pub const PROJECTS_LINK_PREFIX: &str = "/projects";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub link: String,
    #[serde(default)]
    pub is_favorite: bool,
}

impl Project {
    /// Directory name of this project's extracted bundle.
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

/// A project record before the store has assigned it an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub link: String,
    pub is_favorite: bool,
}

impl NewProject {
    /// Record for a freshly ingested bundle.
    pub fn from_upload(title: &str, description: Option<&str>) -> Self {
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION);
        Self {
            title: title.to_owned(),
            description: description.to_owned(),
            technologies: PLACEHOLDER_TECHNOLOGIES
                .iter()
                .map(|t| (*t).to_owned())
                .collect(),
            link: project_link(&slugify(title)),
            is_favorite: false,
        }
    }

    pub fn into_project(self, id: ProjectId) -> Project {
        Project {
            id,
            title: self.title,
            description: self.description,
            technologies: self.technologies,
            link: self.link,
            is_favorite: self.is_favorite,
        }
    }
}

pub fn project_link(slug: &str) -> String {
    format!("{PROJECTS_LINK_PREFIX}/{slug}")
}

/// An archive received from a client and spooled to local disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub original_name: String,
    /// Media type declared by the client, not sniffed.
    pub media_type: String,
}

/// Sample entries a fresh store can be seeded with.
pub fn demo_projects() -> Vec<NewProject> {
    vec![
        NewProject {
            title: "Interactive Calculator".to_owned(),
            description: "A simple JavaScript calculator with a responsive layout.".to_owned(),
            technologies: vec!["JavaScript".into(), "HTML".into(), "CSS".into()],
            link: "#".to_owned(),
            is_favorite: true,
        },
        NewProject {
            title: "Palette Generator (Demo)".to_owned(),
            description: "A script that generates color palettes.".to_owned(),
            technologies: vec!["Python".into(), "Flask".into(), "AI".into()],
            link: "#".to_owned(),
            is_favorite: false,
        },
    ]
}
