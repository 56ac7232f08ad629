pub mod api;
mod middleware;

pub use api::{ApiState, build_api_router};

use axum::{Router, middleware as axum_middleware};

use self::middleware::{log_responses, set_request_context};

/// Mount point of the public API.
pub const API_PREFIX: &str = "/photostream/api";

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .nest(API_PREFIX, build_api_router(state))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
