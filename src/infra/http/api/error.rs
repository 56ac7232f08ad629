use std::error::Error as StdError;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::domain::types::{CommentId, PhotoId};

const SOURCE: &str = "infra::http::api";

/// JSON error body: `response_code` mirrors the HTTP status.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub response_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<PhotoId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<CommentId>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    photo_id: Option<PhotoId>,
    comment_id: Option<CommentId>,
    with_body: bool,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let report = ErrorReport::from_message(SOURCE, status, message.clone());
        Self {
            status,
            message,
            photo_id: None,
            comment_id: None,
            with_body: true,
            report,
        }
    }

    /// Malformed input. Reported as 401, which is what existing clients expect.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn invalid_photo_id() -> Self {
        Self::not_found("invalid photo id")
    }

    pub fn internal(error: &dyn StdError) -> Self {
        Self::from_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error", error)
    }

    pub fn from_error(status: StatusCode, message: impl Into<String>, error: &dyn StdError) -> Self {
        Self {
            report: ErrorReport::from_error(SOURCE, status, error),
            ..Self::new(status, message)
        }
    }

    pub fn with_photo_id(mut self, photo_id: PhotoId) -> Self {
        self.photo_id = Some(photo_id);
        self
    }

    pub fn with_comment_id(mut self, comment_id: CommentId) -> Self {
        self.comment_id = Some(comment_id);
        self
    }

    /// Binary endpoints answer errors with a status only.
    pub fn without_body(mut self) -> Self {
        self.with_body = false;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = if self.with_body {
            let body = ApiErrorBody {
                response_code: self.status.as_u16(),
                message: self.message,
                photo_id: self.photo_id,
                comment_id: self.comment_id,
            };
            (self.status, Json(body)).into_response()
        } else {
            self.status.into_response()
        };
        self.report.attach(&mut response);
        response
    }
}
