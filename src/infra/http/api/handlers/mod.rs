//! API handlers organized by resource.
//!
//! Helpers for id parsing, validators and error conversion live here and are shared by the
//! resource modules.

mod comments;
mod events;
mod feed;
mod health;
mod photos;

pub use comments::*;
pub use events::*;
pub use feed::*;
pub use health::*;
pub use photos::*;

use axum::http::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::application::pagination::FeedError;
use crate::application::photos::PhotoError;
use crate::application::repos::RepoError;
use crate::application::session::SessionError;
use crate::domain::error::DomainError;

use super::error::ApiError;

/// Parses a numeric path segment, naming the parameter in the error.
pub(crate) fn parse_id(raw: &str, label: &str) -> Result<i64, ApiError> {
    raw.trim().parse::<i64>().map_err(|_| {
        ApiError::validation(format!("{label} must be a number but value is: {raw}"))
    })
}

/// The client's cached validator, if it sent one.
pub(crate) fn client_validator(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IF_NONE_MATCH)
        .or_else(|| headers.get(IF_MODIFIED_SINCE))
        .and_then(|value| value.to_str().ok())
}

pub(crate) fn etag_header(validator: &str) -> Result<(HeaderName, HeaderValue), ApiError> {
    HeaderValue::from_str(validator)
        .map(|value| (ETAG, value))
        .map_err(|err| ApiError::internal(&err))
}

pub(crate) fn feed_to_api(err: FeedError) -> ApiError {
    match err {
        FeedError::Session(SessionError::NotFound { kind, .. }) => ApiError::validation(format!(
            "please use {} endpoint first",
            kind.first_page_path()
        )),
        FeedError::MissingQuery => ApiError::validation(err.to_string()),
        FeedError::Repo(err) => repo_to_api(err),
        FeedError::Fingerprint(err) => ApiError::internal(&err),
    }
}

pub(crate) fn photo_to_api(err: PhotoError) -> ApiError {
    match err {
        PhotoError::Domain(DomainError::Validation { message }) => ApiError::validation(message),
        PhotoError::InvalidPhoto(photo_id) => ApiError::invalid_photo_id().with_photo_id(photo_id),
        PhotoError::PhotoNotFound(photo_id) => {
            ApiError::not_found("photo not found").with_photo_id(photo_id)
        }
        PhotoError::CommentNotFound(comment_id) => {
            ApiError::not_found("comment not found").with_comment_id(comment_id)
        }
        PhotoError::Repo(err) => repo_to_api(err),
        PhotoError::Fingerprint(err) => ApiError::internal(&err),
    }
}

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::Timeout => {
            ApiError::from_error(StatusCode::SERVICE_UNAVAILABLE, "database timeout", &err)
        }
        other => ApiError::internal(&other),
    }
}
