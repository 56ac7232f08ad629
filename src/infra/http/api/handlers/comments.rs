//! Comment listing, creation and deletion.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::conditional::Conditional;
use crate::domain::entities::NewComment;
use crate::domain::types::InstallationId;

use super::{client_validator, etag_header, parse_id, photo_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_comments(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let photo_id = parse_id(&raw_id, "photo id")?;
    let outcome = state
        .photos
        .comments(&installation, photo_id, client_validator(&headers))
        .await
        .map_err(photo_to_api)?;

    let etag = etag_header(outcome.validator())?;
    let response = match outcome {
        Conditional::Full { payload, .. } => ([etag], Json(payload)).into_response(),
        Conditional::NotModified { .. } => (StatusCode::NOT_MODIFIED, [etag]).into_response(),
    };
    Ok(response)
}

pub async fn add_comment(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
    Path(raw_id): Path<String>,
    payload: Result<Json<NewComment>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let photo_id = parse_id(&raw_id, "photo id")?;
    let Json(payload) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    let comment = state
        .photos
        .add_comment(&installation, photo_id, payload)
        .await
        .map_err(photo_to_api)?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let comment_id = parse_id(&raw_id, "comment id")?;
    state
        .photos
        .delete_comment(&installation, comment_id)
        .await
        .map_err(photo_to_api)?;
    Ok(StatusCode::OK)
}
