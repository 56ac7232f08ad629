//! Photo upload, deletion, reactions and binary content.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::photos::PhotoError;
use crate::domain::entities::NewPhoto;
use crate::domain::types::{InstallationId, PhotoId};

use super::{etag_header, parse_id, photo_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

#[derive(Debug, Serialize)]
pub struct PhotoDeletedBody {
    pub response_code: u16,
    pub photo_id: PhotoId,
}

pub async fn create_photo(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
    payload: Result<Json<NewPhoto>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    let created = state
        .photos
        .create_photo(&installation, payload)
        .await
        .map_err(photo_to_api)?;

    let response = match created.etag.as_deref() {
        Some(etag) => ([etag_header(etag)?], Json(created.photo)).into_response(),
        None => Json(created.photo).into_response(),
    };
    Ok(response)
}

pub async fn delete_photo(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let photo_id = parse_id(&raw_id, "photo id")?;
    let photo_id = state
        .photos
        .delete_photo(&installation, photo_id)
        .await
        .map_err(photo_to_api)?;

    Ok(Json(PhotoDeletedBody {
        response_code: 200,
        photo_id,
    }))
}

pub async fn like_photo(
    state: State<ApiState>,
    installation: Extension<InstallationId>,
    raw_id: Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    set_favorite(state, installation, raw_id, true).await
}

pub async fn dislike_photo(
    state: State<ApiState>,
    installation: Extension<InstallationId>,
    raw_id: Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    set_favorite(state, installation, raw_id, false).await
}

async fn set_favorite(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
    Path(raw_id): Path<String>,
    favorite: bool,
) -> Result<impl IntoResponse, ApiError> {
    // Reactions report any unusable id as unknown rather than malformed.
    let photo_id = raw_id
        .trim()
        .parse::<PhotoId>()
        .map_err(|_| ApiError::invalid_photo_id())?;

    let record = state
        .photos
        .set_favorite(&installation, photo_id, favorite)
        .await
        .map_err(photo_to_api)?;
    Ok(Json(record))
}

pub async fn photo_content(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let photo_id = parse_id(&raw_id, "photo id").map_err(ApiError::without_body)?;
    let content: Bytes = state
        .photos
        .content(photo_id)
        .await
        .map_err(|err: PhotoError| photo_to_api(err).without_body())?;

    Ok(([(CONTENT_TYPE, "image/png")], content))
}
