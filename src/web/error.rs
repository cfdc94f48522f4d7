// Error types for the image endpoints and their uniform JSON envelope

use std::any::Any;

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error};

pub const MISSING_IMAGE_FIELD: &str = "You have to provide `image` field!";
pub const PNG_ONLY: &str = "Please provide an image with PNG extension!";
pub const JPEG_OR_PNG_ONLY: &str = "The image must be in JPEG or PNG format!";
pub const DIMENSIONS_REQUIRED: &str =
    "You must specify the dimensions using the `width` and `height` fields!";
pub const INVALID_DIMENSIONS: &str =
    "Invalid dimension values for `width` or/and `height` fields!";
pub const STREAM_FAILED: &str = "Failed to stream image file";
pub const READ_FAILED: &str = "Failed to read image file";
pub const DECODE_FAILED: &str = "Failed to decode image";
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Errors surfaced by the HTTP layer. Every variant renders as the same
/// `{ code, message, status }` envelope.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    MethodNotAllowed(String),
    PayloadTooLarge(String),
    InternalServerError(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalServerError(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(msg)
            | Self::NotFound(msg)
            | Self::MethodNotAllowed(msg)
            | Self::PayloadTooLarge(msg)
            | Self::InternalServerError(msg) => msg,
        }
    }

    /// Maps a multipart failure while walking the form. Oversized bodies keep
    /// their 413, everything else is a broken upload stream.
    pub fn from_multipart(err: MultipartError, fallback: &str) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::PayloadTooLarge("Request body is too large".to_string());
        }
        debug!("Multipart error: {}", err.body_text());
        Self::InternalServerError(fallback.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("Request failed with {}: {}", status.as_u16(), self.message());
        } else {
            debug!("Request rejected with {}: {}", status.as_u16(), self.message());
        }

        let body = Json(json!({
            "code": status.as_u16(),
            "message": self.message(),
            "status": "error",
        }));

        (status, body).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::from_multipart(err, STREAM_FAILED)
    }
}

/// Turns a handler panic into the generic 500 envelope.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    error!("Handler panicked: {}", details);

    ApiError::internal(INTERNAL_SERVER_ERROR).into_response()
}
