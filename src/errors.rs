use crate::services::post_composer::PostError;
use axum::{
    Json,
    extract::{multipart::MultipartError, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::{error, warn};

/// A lightweight wrapper for general errors that keeps the message local.
///
/// `message` is what the browser sees; upstream detail never ends up here.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// The one place component failures become HTTP responses.
///
/// Client input errors are echoed back; every other failure is logged with
/// its full detail and replaced by a fixed message.
impl From<PostError> for AppError {
    fn from(err: PostError) -> Self {
        let message = match &err {
            PostError::InvalidInput(input) => {
                warn!(error = %input, "rejected post submission");
                return AppError::bad_request(input.to_string());
            }
            PostError::MediaUpload(_) => "Failed to upload media",
            PostError::Publish(_) => "Failed to post to social media",
            PostError::History(_) => "Failed to fetch post history",
            PostError::Accounts(_) => "Failed to fetch user accounts",
            PostError::LinkNotConfigured(_)
            | PostError::PrivateKey { .. }
            | PostError::Handshake(_) => "Failed to generate JWT URL",
        };
        error!(error = %err, "{}", message);
        AppError::internal(message)
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        warn!(error = %err, "malformed multipart body");
        AppError::new(err.status(), err.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        warn!(error = %rejection, "malformed query string");
        AppError::new(rejection.status(), rejection.body_text())
    }
}
