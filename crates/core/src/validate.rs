use crate::{errors::ValidationError, model::UploadedFile};

/// Whether a declared media type names a zip archive
/// (`application/zip`, `application/x-zip-compressed`, ...).
pub fn is_archive_media_type(media_type: &str) -> bool {
    media_type.to_ascii_lowercase().contains("zip")
}

/// Checks an upload's name and file.
///
/// A name that is blank once trimmed is rejected. The name is returned as
/// given; titles and slugs keep surrounding whitespace.
pub fn validate_upload<'a>(
    name: Option<&'a str>,
    file: Option<&UploadedFile>,
) -> Result<&'a str, ValidationError> {
    let name = name.unwrap_or_default();
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let file = file.ok_or(ValidationError::MissingFile)?;
    if !is_archive_media_type(&file.media_type) {
        return Err(ValidationError::NotAnArchive(file.media_type.clone()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn upload(media_type: &str) -> UploadedFile {
        UploadedFile {
            path: PathBuf::from("/tmp/upload"),
            original_name: "bundle.zip".into(),
            media_type: media_type.into(),
        }
    }

    #[test]
    fn archive_media_types() {
        assert!(is_archive_media_type("application/zip"));
        assert!(is_archive_media_type("application/x-zip-compressed"));
        assert!(is_archive_media_type("Application/ZIP"));
        assert!(!is_archive_media_type("text/plain"));
        assert!(!is_archive_media_type("application/octet-stream"));
    }

    #[test]
    fn rejects_in_order() {
        let zip = upload("application/zip");
        assert_eq!(validate_upload(None, Some(&zip)), Err(ValidationError::EmptyName));
        assert_eq!(validate_upload(Some("  "), Some(&zip)), Err(ValidationError::EmptyName));
        assert_eq!(validate_upload(Some("x"), None), Err(ValidationError::MissingFile));
        assert_eq!(
            validate_upload(Some("x"), Some(&upload("image/png"))),
            Err(ValidationError::NotAnArchive("image/png".into()))
        );
        assert_eq!(validate_upload(Some(" Calc App "), Some(&zip)), Ok(" Calc App "));
    }
}
