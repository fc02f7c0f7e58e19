//! Title to directory-name mapping.
//!
//! A project's extracted bundle lives under `<projects root>/<slug>`, and the
//! slug is recomputed from the title on every lookup. Every component must go
//! through [`slugify`] (or [`crate::Project::slug`]) so the mapping stays
//! identical for the life of a project.

use regex::Regex;

/// Lowercases `title` and collapses every run of characters outside `[a-z0-9]`
/// into a single `-`. Leading and trailing separators are kept.
pub fn slugify(title: &str) -> String {
    let re = Regex::new(r"[^a-z0-9]+").expect("valid regex");
    let lowered = title.to_lowercase();
    re.replace_all(&lowered, "-").into_owned()
}
