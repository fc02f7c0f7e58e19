use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use folio_core::CoreError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
}

/// Error half of every API handler. Bodies are plain text; the client shows
/// them to the user as-is.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
}

pub(crate) fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::InvalidUpload(_) | CoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) | CoreError::DirectoryMissing(_) | CoreError::FileMissing(_) => {
            StatusCode::NOT_FOUND
        }
        CoreError::ExtractionFailed(_) | CoreError::Storage(_) | CoreError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Core(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    error!(error = %err, "request failed");
                }
                (status, err.to_string()).into_response()
            }
            ApiError::Multipart(err) => err.into_response(),
        }
    }
}
