//! Server runtime: project registry behind a small REST API.

pub mod error;
pub mod http;
pub mod registry;

use std::{fs, future::IntoFuture, net::SocketAddr, path::PathBuf, sync::Arc};

use axum::Router;
use folio_core::traits::ProjectStore;
use folio_files::FileBrowser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use crate::error::{ApiError, ServerError};
pub use crate::http::{AppState, FavoriteUpdate, FILE_FIELD};
pub use crate::registry::{Registry, Upload};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ServerOptions {
    /// Extracted bundles live at `<projects_root>/<slug>`.
    pub projects_root: PathBuf,
    /// Spool directory for archives still being uploaded.
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            projects_root: PathBuf::from("./projects"),
            uploads_dir: PathBuf::from("./uploads_temp"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

pub struct Server<S> {
    registry: Registry<S>,
    options: ServerOptions,
}

impl<S> Clone for Server<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            options: self.options.clone(),
        }
    }
}

impl<S> Server<S>
where
    S: ProjectStore + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::new_with_options(store, ServerOptions::default())
    }

    #[must_use]
    pub fn new_with_options(store: S, options: ServerOptions) -> Self {
        for dir in [&options.projects_root, &options.uploads_dir] {
            if let Err(err) = fs::create_dir_all(dir) {
                warn!(path = %dir.display(), error = %err, "failed to create directory");
            }
        }
        let browser = FileBrowser::new(&options.projects_root);
        Self {
            registry: Registry::new(store, browser),
            options,
        }
    }

    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            uploads_dir: Arc::new(self.options.uploads_dir.clone()),
        };
        http::router(state, self.options.max_upload_bytes)
    }

    pub async fn run_http(&self, addr: &str) -> Result<(), ServerError> {
        let bind_addr: SocketAddr = addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ServerError::Parse(e.to_string()))?;
        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .map_err(|e| ServerError::Io(e.to_string()))?;

        info!(
            %addr,
            root = %self.options.projects_root.display(),
            uploads = %self.options.uploads_dir.display(),
            "http server listening"
        );
        let shutdown_token = CancellationToken::new();
        let server_shutdown = shutdown_token.child_token();
        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                server_shutdown.cancelled().await;
            })
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            res = &mut server => {
                res.map_err(|e| ServerError::Io(e.to_string()))
            }
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl_c received; shutting down http server");
                shutdown_token.cancel();
                server.as_mut().await.map_err(|e| ServerError::Io(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use folio_core::model::Project;
    use folio_storage_ephemeral::EphemeralStore;
    use serde_json::{json, Value};
    use std::io::{Cursor, Write};
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;
    use zip::{write::SimpleFileOptions, ZipWriter};

    const BOUNDARY: &str = "folio-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File {
            filename: &'a str,
            content_type: &'a str,
            bytes: Vec<u8>,
        },
    }

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
                Part::File {
                    filename,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{FILE_FIELD}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/api/projects")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn patch_favorite(id: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri(format!("/api/projects/{id}/favorite"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn test_server(store: EphemeralStore) -> (TempDir, Server<EphemeralStore>) {
        let tmp = tempdir().unwrap();
        let options = ServerOptions {
            projects_root: tmp.path().join("projects"),
            uploads_dir: tmp.path().join("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        };
        let server = Server::new_with_options(store, options);
        (tmp, server)
    }

    async fn send(server: &Server<EphemeralStore>, req: Request<Body>) -> Response {
        server.router().oneshot(req).await.unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json(resp: Response) -> Value {
        serde_json::from_slice(&body_bytes(resp).await).unwrap()
    }

    fn uploads_empty(server: &Server<EphemeralStore>) -> bool {
        fs::read_dir(&server.options().uploads_dir)
            .unwrap()
            .next()
            .is_none()
    }

    fn calc_app_upload() -> Request<Body> {
        upload_request(&[
            Part::Text("name", "Calc App"),
            Part::Text("description", "desc"),
            Part::File {
                filename: "calc.zip",
                content_type: "application/zip",
                bytes: zip_bytes(&[("index.html", b"<h1>calc</h1>")]),
            },
        ])
    }

    #[tokio::test]
    async fn upload_favorite_browse_and_fetch() {
        let (_tmp, server) = test_server(EphemeralStore::new());

        let resp = send(&server, calc_app_upload()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Project = serde_json::from_value(body_json(resp).await).unwrap();
        assert_eq!(created.title, "Calc App");
        assert_eq!(created.description, "desc");
        assert_eq!(created.technologies, ["HTML", "CSS", "JS", "ZIP"]);
        assert_eq!(created.link, "/projects/calc-app");
        assert!(!created.is_favorite);
        assert!(uploads_empty(&server));

        let resp = send(&server, patch_favorite(&created.id, json!({"isFavorite": true}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            json!({"id": created.id, "isFavorite": true})
        );

        let resp = send(&server, get(&format!("/api/projects/{}/files", created.id))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!(["index.html"]));

        let resp = send(
            &server,
            get(&format!("/api/projects/{}/file/index.html", created.id)),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(body_bytes(resp).await, b"<h1>calc</h1>");

        let resp = send(&server, get("/projects/calc-app/index.html")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected() {
        let (_tmp, server) = test_server(EphemeralStore::new());

        let resp = send(&server, upload_request(&[Part::Text("name", "Calc App")])).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(server.registry().store().len().unwrap(), 0);
        let resp = send(&server, get("/api/projects")).await;
        assert_eq!(body_json(resp).await, json!([]));
    }

    #[tokio::test]
    async fn wrong_media_type_removes_spooled_file() {
        let (_tmp, server) = test_server(EphemeralStore::new());

        let resp = send(
            &server,
            upload_request(&[
                Part::Text("name", "Notes"),
                Part::File {
                    filename: "notes.txt",
                    content_type: "text/plain",
                    bytes: b"hello".to_vec(),
                },
            ]),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(uploads_empty(&server));
        assert_eq!(server.registry().store().len().unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupt_archive_is_server_error() {
        let (tmp, server) = test_server(EphemeralStore::new());

        let resp = send(
            &server,
            upload_request(&[
                Part::Text("name", "Broken"),
                Part::File {
                    filename: "broken.zip",
                    content_type: "application/zip",
                    bytes: b"not a zip at all".to_vec(),
                },
            ]),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(uploads_empty(&server));
        assert!(!tmp.path().join("projects").join("broken").exists());
        assert_eq!(server.registry().store().len().unwrap(), 0);
    }

    #[tokio::test]
    async fn favorite_errors() {
        let (_tmp, server) = test_server(EphemeralStore::with_demo_projects());

        let resp = send(&server, patch_favorite("zzz", json!({"isFavorite": true}))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // Unknown id wins over a malformed body.
        let resp = send(&server, patch_favorite("zzz", json!({"isFavorite": "yes"}))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&server, patch_favorite("p2", json!({"isFavorite": "yes"}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(&server, patch_favorite("p2", json!({"is_favorite": true}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({"id": "p2", "isFavorite": true}));
    }

    #[tokio::test]
    async fn listing_puts_favorites_first() {
        let (_tmp, server) = test_server(EphemeralStore::with_demo_projects());

        let resp = send(&server, patch_favorite("p1", json!({"isFavorite": false}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = send(&server, patch_favorite("p2", json!({"isFavorite": true}))).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(&server, get("/api/projects")).await;
        let listed = body_json(resp).await;
        let ids: Vec<_> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(ids, ["p2", "p1"]);
    }

    #[tokio::test]
    async fn deleted_directory_reports_missing() {
        let (tmp, server) = test_server(EphemeralStore::new());
        let resp = send(&server, calc_app_upload()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        fs::remove_dir_all(tmp.path().join("projects").join("calc-app")).unwrap();

        let resp = send(&server, get("/api/projects/p1/files")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let message = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(message.contains("directory"), "{message}");

        let resp = send(&server, get("/api/projects")).await;
        assert_eq!(body_json(resp).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_project_and_file_are_not_found() {
        let (_tmp, server) = test_server(EphemeralStore::new());
        let resp = send(&server, calc_app_upload()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        for uri in [
            "/api/projects/zzz/files",
            "/api/projects/zzz/file/index.html",
            "/api/projects/p1/file/missing.js",
        ] {
            let resp = send(&server, get(uri)).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn traversal_cannot_read_outside_project() {
        let (tmp, server) = test_server(EphemeralStore::new());
        fs::write(tmp.path().join("secret.txt"), "top secret").unwrap();
        let resp = send(&server, calc_app_upload()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        for uri in [
            "/api/projects/p1/file/..%2F..%2Fsecret.txt",
            "/api/projects/p1/file/%2E%2E%2F%2E%2E%2Fsecret.txt",
            "/api/projects/p1/file/..%5C..%5Csecret.txt",
        ] {
            let resp = send(&server, get(uri)).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
            let body = body_bytes(resp).await;
            assert!(!String::from_utf8_lossy(&body).contains("top secret"));
        }
    }

    #[tokio::test]
    async fn path_below_a_file_is_not_found() {
        let (_tmp, server) = test_server(EphemeralStore::new());
        let resp = send(&server, calc_app_upload()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = send(&server, get("/api/projects/p1/file/index.html%2Fnope")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn healthz_ok() {
        let (_tmp, server) = test_server(EphemeralStore::new());
        let resp = send(&server, get("/healthz")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"ok");
    }
}
