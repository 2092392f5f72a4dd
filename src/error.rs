use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::files::FileStoreError;
use crate::message::ValidationError;
use crate::store::StoreError;

/// Failures surfaced on the HTTP paths. The relay never uses this type: on
/// the socket path, failures are logged and dropped.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no file was uploaded")]
    MissingFile,
    #[error("invalid upload request: {0}")]
    Multipart(#[from] MultipartError),
    #[error("message store unavailable")]
    Store(#[from] StoreError),
    #[error("file upload failed")]
    Upload(#[from] FileStoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::MissingFile | ApiError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Store(_) | ApiError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("request failed: {:?}", self);
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400() {
        let response =
            ApiError::Validation(ValidationError::MissingField("body")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_file_maps_to_400() {
        let response = ApiError::MissingFile.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_failure_maps_to_500() {
        let response = ApiError::Store(StoreError::Timeout).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upload_failure_maps_to_500() {
        let response = ApiError::Upload(FileStoreError::Timeout).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
