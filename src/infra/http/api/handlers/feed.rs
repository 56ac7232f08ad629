//! Stream and search page handlers.

use axum::Json;
use axum::extract::{Extension, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::application::conditional::Conditional;
use crate::domain::types::InstallationId;

use super::{client_validator, etag_header, feed_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

const PHOTO_PAGE_HEADER: HeaderName = HeaderName::from_static("photo-page");

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn stream_first_page(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let outcome = state
        .stream
        .first_page_conditional(&installation, client_validator(&headers))
        .await
        .map_err(feed_to_api)?;

    let etag = etag_header(outcome.validator())?;
    let response = match outcome {
        Conditional::Full { payload, .. } => ([etag], Json(payload)).into_response(),
        Conditional::NotModified { .. } => (
            StatusCode::NOT_MODIFIED,
            [etag, (PHOTO_PAGE_HEADER, HeaderValue::from_static("1"))],
        )
            .into_response(),
    };
    Ok(response)
}

pub async fn stream_more(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .stream
        .more_page(&installation)
        .await
        .map_err(feed_to_api)?;
    Ok(Json(page))
}

pub async fn search_first_page(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .search
        .first_page(&installation, query.q.as_deref())
        .await
        .map_err(feed_to_api)?;
    Ok(Json(page))
}

pub async fn search_more(
    State(state): State<ApiState>,
    Extension(installation): Extension<InstallationId>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .search
        .more_page(&installation)
        .await
        .map_err(feed_to_api)?;
    Ok(Json(page))
}
