pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

/// Routes relative to the API prefix.
///
/// Everything except binary content and the health probe requires an `installation_id`.
pub fn build_api_router(state: ApiState) -> Router {
    let viewer_routes = Router::new()
        .route("/stream", get(handlers::stream_first_page))
        .route("/stream/more", get(handlers::stream_more))
        .route("/search", get(handlers::search_first_page))
        .route("/search/more", get(handlers::search_more))
        .route("/image", post(handlers::create_photo))
        .route("/image/{id}", delete(handlers::delete_photo))
        .route("/image/{id}/comment", post(handlers::add_comment))
        .route("/image/{id}/comments", get(handlers::list_comments))
        .route("/image/{id}/like", put(handlers::like_photo))
        .route("/image/{id}/dislike", put(handlers::dislike_photo))
        .route("/comment/{id}", delete(handlers::delete_comment))
        .route("/events", get(handlers::events))
        .route_layer(axum_middleware::from_fn(middleware::require_installation));

    let open_routes = Router::new()
        .route("/image/{id}/content", get(handlers::photo_content))
        .route("/health", get(handlers::health));

    viewer_routes.merge(open_routes).with_state(state)
}
