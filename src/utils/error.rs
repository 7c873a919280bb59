use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Invalid probability vector: {0}")]
    InvalidVector(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Malformed case id: {0}")]
    MalformedId(String),

    #[error("Stored image not found: {0}")]
    ImageNotFound(String),

    #[error("{stage} timed out after {timeout:?}")]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for TriageError {
    fn from(err: sqlx::Error) -> Self {
        TriageError::StorageUnavailable(err.to_string())
    }
}

impl From<image::ImageError> for TriageError {
    fn from(err: image::ImageError) -> Self {
        TriageError::Decode(err.to_string())
    }
}

impl TriageError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TriageError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TriageError::ShapeMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            TriageError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TriageError::MalformedId(_) => StatusCode::BAD_REQUEST,
            TriageError::ImageNotFound(_) => StatusCode::NOT_FOUND,
            TriageError::Base64(_) => StatusCode::BAD_REQUEST,
            TriageError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            TriageError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TriageError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            TriageError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            TriageError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            TriageError::Decode(_) => "DECODE_ERROR",
            TriageError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            TriageError::Inference(_) => "INFERENCE_ERROR",
            TriageError::InvalidVector(_) => "INVALID_VECTOR",
            TriageError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            TriageError::MalformedId(_) => "MALFORMED_ID",
            TriageError::ImageNotFound(_) => "IMAGE_NOT_FOUND",
            TriageError::Timeout { .. } => "TIMEOUT",
            TriageError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            TriageError::InvalidInput(_) => "INVALID_INPUT",
            TriageError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            TriageError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            TriageError::Config(_) => "CONFIG_ERROR",
            TriageError::Io(_) => "IO_ERROR",
            TriageError::Base64(_) => "BASE64_DECODE_ERROR",
            TriageError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for TriageError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "success": false,
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}
