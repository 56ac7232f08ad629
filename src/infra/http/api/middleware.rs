use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::domain::types::InstallationId;

use super::error::ApiError;

pub const INSTALLATION_HEADER: &str = "installation_id";

/// Resolves the calling installation and stores it in the request extensions.
pub async fn require_installation(mut request: Request<Body>, next: Next) -> Response {
    let installation = request
        .headers()
        .get(INSTALLATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(InstallationId::parse);

    let Some(installation) = installation else {
        return ApiError::validation(format!("missing header: {INSTALLATION_HEADER}"))
            .into_response();
    };

    request.extensions_mut().insert(installation);
    next.run(request).await
}
