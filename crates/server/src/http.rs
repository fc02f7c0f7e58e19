//! JSON-over-HTTP surface for the registry.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use chrono::Utc;
use folio_core::{
    model::{Project, ProjectId, UploadedFile},
    traits::ProjectStore,
    CoreError,
};
use folio_ingest::remove_file_best_effort;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::debug;

use crate::{
    error::ApiError,
    registry::{Registry, Upload},
};

/// Multipart field carrying the archive.
pub const FILE_FIELD: &str = "projectFile";

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

pub struct AppState<S> {
    pub registry: Registry<S>,
    pub uploads_dir: Arc<PathBuf>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            uploads_dir: Arc::clone(&self.uploads_dir),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteUpdate {
    pub id: ProjectId,
    pub is_favorite: bool,
}

pub fn router<S>(state: AppState<S>, max_upload_bytes: usize) -> Router
where
    S: ProjectStore + Send + Sync + 'static,
{
    let bundles = ServeDir::new(state.registry.browser().root());
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/projects",
            get(list_projects::<S>).post(create_project::<S>),
        )
        .route("/api/projects/{id}/favorite", patch(set_favorite::<S>))
        .route("/api/projects/{id}/files", get(list_files::<S>))
        .route("/api/projects/{id}/file/{filename}", get(get_file::<S>))
        .nest_service("/projects", bundles)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::Io(e.to_string()))?
        .map_err(ApiError::from)
}

async fn list_projects<S>(State(state): State<AppState<S>>) -> Result<Json<Vec<Project>>, ApiError>
where
    S: ProjectStore + Send + Sync + 'static,
{
    Ok(Json(state.registry.list_all()?))
}

async fn create_project<S>(
    State(state): State<AppState<S>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Project>), ApiError>
where
    S: ProjectStore + Send + Sync + 'static,
{
    let upload = read_upload(&state.uploads_dir, &mut multipart).await?;
    let registry = state.registry.clone();
    let project = blocking(move || registry.register(upload)).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn set_favorite<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<FavoriteUpdate>, ApiError>
where
    S: ProjectStore + Send + Sync + 'static,
{
    // Unknown ids are reported before a malformed body.
    state.registry.project(&id)?;
    let is_favorite = parse_favorite(&body)?;
    let project = state.registry.set_favorite(&id, is_favorite)?;
    Ok(Json(FavoriteUpdate {
        id: project.id,
        is_favorite: project.is_favorite,
    }))
}

fn parse_favorite(body: &[u8]) -> Result<bool, CoreError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| CoreError::BadRequest(format!("invalid JSON body: {e}")))?;
    value
        .get("isFavorite")
        .or_else(|| value.get("is_favorite"))
        .and_then(serde_json::Value::as_bool)
        .ok_or_else(|| CoreError::BadRequest("isFavorite must be a boolean".into()))
}

async fn list_files<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, ApiError>
where
    S: ProjectStore + Send + Sync + 'static,
{
    let registry = state.registry.clone();
    let files = blocking(move || registry.list_files(&id)).await?;
    Ok(Json(files))
}

async fn get_file<S>(
    State(state): State<AppState<S>>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    S: ProjectStore + Send + Sync + 'static,
{
    let registry = state.registry.clone();
    let lookup = filename.clone();
    let resolved = blocking(move || registry.resolve_file(&id, &lookup)).await?;
    let file = open_resolved(&resolved.path, &filename).await?;
    let body = Body::from_stream(ReaderStream::new(file));
    Ok(([(header::CONTENT_TYPE, resolved.content_type)], body))
}

/// Opens a resolved file for streaming. A file removed since it was
/// resolved is still a missing file.
async fn open_resolved(path: &FsPath, filename: &str) -> Result<tokio::fs::File, CoreError> {
    tokio::fs::File::open(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CoreError::FileMissing(filename.to_owned()),
        _ => CoreError::Io(e.to_string()),
    })
}

/// Collects the multipart form. A spooled archive is removed again if the
/// form turns out to be unreadable.
async fn read_upload(uploads_dir: &FsPath, multipart: &mut Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();
    if let Err(err) = read_fields(uploads_dir, multipart, &mut upload).await {
        if let Some(file) = upload.file.take() {
            remove_file_best_effort(&file.path);
        }
        return Err(err);
    }
    Ok(upload)
}

async fn read_fields(
    uploads_dir: &FsPath,
    multipart: &mut Multipart,
    upload: &mut Upload,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_owned();
        match field_name.as_str() {
            "name" => upload.name = Some(field.text().await?),
            "description" => upload.description = Some(field.text().await?),
            FILE_FIELD => {
                let spooled = spool(uploads_dir, field).await?;
                if let Some(previous) = std::mem::replace(&mut upload.file, spooled) {
                    remove_file_best_effort(&previous.path);
                }
            }
            other => debug!(field = other, "ignoring multipart field"),
        }
    }
    Ok(())
}

/// Streams a file field to the uploads directory. An empty part without a
/// filename (a form submitted with no file chosen) counts as no file.
async fn spool(uploads_dir: &FsPath, mut field: Field<'_>) -> Result<Option<UploadedFile>, ApiError> {
    let original_name = field.file_name().unwrap_or_default().to_owned();
    let media_type = field
        .content_type()
        .unwrap_or(FALLBACK_MEDIA_TYPE)
        .to_owned();
    let path = uploads_dir.join(format!(
        "{}-{}.upload",
        Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    ));

    let written = match write_field(&path, &mut field).await {
        Ok(written) => written,
        Err(err) => {
            remove_file_best_effort(&path);
            return Err(err);
        }
    };
    if written == 0 && original_name.is_empty() {
        remove_file_best_effort(&path);
        return Ok(None);
    }
    debug!(path = %path.display(), bytes = written, media_type = %media_type, "upload spooled");
    Ok(Some(UploadedFile {
        path,
        original_name,
        media_type,
    }))
}

async fn write_field(path: &FsPath, field: &mut Field<'_>) -> Result<u64, ApiError> {
    let io_err = |e: std::io::Error| ApiError::from(CoreError::Io(e.to_string()));
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    }
    let mut out = tokio::fs::File::create(path).await.map_err(io_err)?;
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        out.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    out.flush().await.map_err(io_err)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn vanished_file_is_missing() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("index.html");
        std::fs::write(&path, "<h1>gone soon</h1>").unwrap();
        assert!(open_resolved(&path, "index.html").await.is_ok());

        std::fs::remove_file(&path).unwrap();
        let err = open_resolved(&path, "index.html").await.unwrap_err();
        assert!(matches!(err, CoreError::FileMissing(ref name) if name == "index.html"));
    }
}
