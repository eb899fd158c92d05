//! Error types for the gallery server.
//!
//! Each module owns a small error enum; `ApiError` wraps them at the HTTP
//! boundary and decides which status code the client sees.
//!
//! ## Rust concepts
//! - `thiserror` derive for `Display` + `std::error::Error`
//! - `#[from]` for automatic `?` conversion between error types
//! - `IntoResponse` so handlers can return `Result<_, ApiError>`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to scan the image directory.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read image directory {path}: {source}")]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("image root {0} is not a directory")]
    NotADirectory(PathBuf),
}

/// Failure to write embedded metadata. Reads never fail; they fall back.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("cannot write metadata into {0}: unsupported image format")]
    UnsupportedFormat(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write metadata into {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure to accept an uploaded image.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no image file in upload")]
    Missing,
    #[error("uploaded file is empty")]
    Empty,
    #[error("uploaded file is not a supported image (jpg, png, gif)")]
    NotAnImage,
    #[error("failed to store upload: {0}")]
    Io(#[from] io::Error),
}

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no image directory configured (use --images-dir or imageFolder in the config file)")]
    MissingImagesDir,
    #[error("image directory {path} is not usable: {source}")]
    ImagesDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Access denied")]
    AccessDenied,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("Failed to update metadata: {0}")]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AccessDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upload(UploadError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::Catalog(_) | ApiError::Metadata(_) | ApiError::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(status = %status, error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ApiError::AccessDenied, StatusCode::FORBIDDEN)]
    #[case(ApiError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(ApiError::Upload(UploadError::Missing), StatusCode::BAD_REQUEST)]
    #[case(ApiError::Upload(UploadError::NotAnImage), StatusCode::BAD_REQUEST)]
    #[case(
        ApiError::Upload(UploadError::Io(io::Error::other("disk full"))),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    #[case(
        ApiError::Metadata(MetadataError::UnsupportedFormat("a.gif".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn api_error_status(#[case] err: ApiError, #[case] expected: StatusCode) {
        assert_eq!(err.status_code(), expected);
    }

    #[test]
    fn access_denied_message() {
        let response = ApiError::AccessDenied.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
