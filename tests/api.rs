use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use photostream::application::notifier::{BroadcastPublisher, MutationNotifier};
use photostream::application::photos::PhotoService;
use photostream::application::search::SearchService;
use photostream::application::session::SessionCache;
use photostream::application::stream::StreamService;
use photostream::infra::http::{ApiState, build_router};
use photostream::infra::memory::InMemoryRepositories;

const PREFIX: &str = "/photostream/api";

fn router() -> Router {
    let store = Arc::new(InMemoryRepositories::new());
    let sessions = Arc::new(SessionCache::new(Duration::from_secs(3600)));
    let page_size = NonZeroU32::new(20).unwrap();
    let stream = StreamService::new(store.clone(), sessions.clone(), page_size);
    let search = SearchService::new(store.clone(), sessions, page_size);
    let events = Arc::new(BroadcastPublisher::new(16));
    let notifier = MutationNotifier::new(events.clone());
    let photos = PhotoService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        stream.clone(),
        notifier,
        150,
    );

    build_router(ApiState {
        stream: Arc::new(stream),
        search: Arc::new(search),
        photos: Arc::new(photos),
        events,
        store,
    })
}

fn request(
    method: Method,
    path: &str,
    installation: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(format!("{PREFIX}{path}"));
    if let Some(installation) = installation {
        builder = builder.header("installation_id", installation);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

async fn call(
    router: &Router,
    method: Method,
    path: &str,
    installation: Option<&str>,
) -> Response<Body> {
    send(router, request(method, path, installation, None)).await
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn upload(router: &Router, installation: &str, title: &str) -> Value {
    let body = json!({ "title": title, "image": STANDARD.encode(b"\x89PNG") });
    let response = send(
        router,
        request(Method::POST, "/image", Some(installation), Some(body)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn stream_first_page_supports_conditional_requests() {
    let router = router();
    upload(&router, "owner", "Harbour").await;

    let response = call(&router, Method::GET, "/stream", Some("viewer")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response.headers()[header::ETAG].to_str().unwrap().to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));
    let body = json_body(response).await;
    assert_eq!(body["page"], 1);
    assert_eq!(body["photos"][0]["title"], "Harbour");
    assert_eq!(body["photos"][0]["deleteable"], false);

    let revalidate = request(Method::GET, "/stream", Some("viewer"), None);
    let (mut parts, body) = revalidate.into_parts();
    parts
        .headers
        .insert(header::IF_NONE_MATCH, etag.parse().unwrap());
    let response = send(&router, Request::from_parts(parts, body)).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers()[header::ETAG], etag.as_str());
    assert_eq!(response.headers()["photo-page"], "1");
}

#[tokio::test]
async fn favorites_do_not_change_the_stream_validator() {
    let router = router();
    let photo = upload(&router, "owner", "Harbour").await;
    let id = photo["photo_id"].as_i64().unwrap();

    let before = call(&router, Method::GET, "/stream", Some("viewer")).await;
    let before = before.headers()[header::ETAG].clone();

    let liked = call(&router, Method::PUT, &format!("/image/{id}/like"), Some("viewer")).await;
    assert_eq!(liked.status(), StatusCode::OK);
    assert_eq!(json_body(liked).await, json!({ "photo_id": id, "favorite": true }));

    let after = call(&router, Method::GET, "/stream", Some("viewer")).await;
    assert_eq!(after.headers()[header::ETAG], before);
    assert_eq!(json_body(after).await["photos"][0]["favorite"], true);
}

#[tokio::test]
async fn stream_validator_is_shared_across_viewers() {
    let router = router();
    upload(&router, "owner", "Harbour").await;

    let for_owner = call(&router, Method::GET, "/stream", Some("owner")).await;
    let owner_etag = for_owner.headers()[header::ETAG].clone();
    assert_eq!(json_body(for_owner).await["photos"][0]["deleteable"], true);

    let for_viewer = call(&router, Method::GET, "/stream", Some("viewer")).await;
    assert_eq!(for_viewer.headers()[header::ETAG], owner_etag);
    assert_eq!(json_body(for_viewer).await["photos"][0]["deleteable"], false);
}

#[tokio::test]
async fn upload_returns_the_new_stream_validator() {
    let router = router();
    let body = json!({ "title": "Dunes", "image": STANDARD.encode(b"img") });
    let created = send(&router, request(Method::POST, "/image", Some("owner"), Some(body))).await;
    assert_eq!(created.status(), StatusCode::OK);
    let upload_etag = created.headers()[header::ETAG].clone();

    let stream = call(&router, Method::GET, "/stream", Some("owner")).await;
    assert_eq!(stream.headers()[header::ETAG], upload_etag);
}

#[tokio::test]
async fn more_before_first_page_names_the_entry_point() {
    let router = router();

    let response = call(&router, Method::GET, "/stream/more", Some("viewer")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["response_code"], 401);
    assert_eq!(body["message"], "please use /stream endpoint first");

    let response = call(&router, Method::GET, "/search/more", Some("viewer")).await;
    assert_eq!(json_body(response).await["message"], "please use /search endpoint first");
}

#[tokio::test]
async fn search_requires_a_query() {
    let router = router();

    let response = call(&router, Method::GET, "/search?q=%20%20", Some("viewer")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    upload(&router, "owner", "Night Sky").await;
    let response = call(&router, Method::GET, "/search?q=sky", Some("viewer")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["photos"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_next_page"], false);
}

#[tokio::test]
async fn viewer_routes_require_an_installation() {
    let router = router();

    let response = call(&router, Method::GET, "/stream", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await["message"],
        "missing header: installation_id"
    );

    let response = call(&router, Method::GET, "/nowhere", Some("viewer")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_ids_are_rejected() {
    let router = router();

    let response = call(&router, Method::DELETE, "/image/abc", Some("owner")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await["message"],
        "photo id must be a number but value is: abc"
    );

    let response = call(&router, Method::PUT, "/image/abc/like", Some("owner")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["message"], "invalid photo id");
}

#[tokio::test]
async fn comments_round_trip_with_limits() {
    let router = router();
    let photo = upload(&router, "owner", "Harbour").await;
    let id = photo["photo_id"].as_i64().unwrap();

    let too_long = json!({ "message": "x".repeat(151) });
    let comment_path = format!("/image/{id}/comment");
    let response = send(
        &router,
        request(Method::POST, &comment_path, Some("viewer"), Some(too_long)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await["message"],
        "comment size of 150 characters exceeded"
    );

    let lovely = json!({ "message": "lovely" });
    let response = send(
        &router,
        request(Method::POST, &comment_path, Some("viewer"), Some(lovely)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let comment = json_body(response).await;
    assert_eq!(comment["deleteable"], true);

    let comments_path = format!("/image/{id}/comments");
    let response = call(&router, Method::GET, &comments_path, Some("owner")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response.headers()[header::ETAG].clone();
    let list = json_body(response).await;
    assert_eq!(list["comments"][0]["message"], "lovely");
    assert_eq!(list["comments"][0]["deleteable"], false);

    let revalidate = Request::builder()
        .uri(format!("{PREFIX}{comments_path}"))
        .header("installation_id", "owner")
        .header(header::IF_NONE_MATCH, etag)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&router, revalidate).await.status(), StatusCode::NOT_MODIFIED);

    let comment_id = comment["comment_id"].as_i64().unwrap();
    let delete_path = format!("/comment/{comment_id}");
    let response = call(&router, Method::DELETE, &delete_path, Some("owner")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "response_code": 404, "message": "comment not found", "comment_id": comment_id })
    );

    let response = call(&router, Method::DELETE, &delete_path, Some("viewer")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_photos_report_their_id() {
    let router = router();

    let response = call(&router, Method::DELETE, "/image/77", Some("owner")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "response_code": 404, "message": "photo not found", "photo_id": 77 })
    );

    let response = call(&router, Method::GET, "/image/77/comments", Some("owner")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["message"], "invalid photo id");

    let response = call(&router, Method::PUT, "/image/77/dislike", Some("owner")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owners_delete_their_photos() {
    let router = router();
    let photo = upload(&router, "owner", "Harbour").await;
    let id = photo["photo_id"].as_i64().unwrap();

    let response = call(&router, Method::DELETE, &format!("/image/{id}"), Some("viewer")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = call(&router, Method::DELETE, &format!("/image/{id}"), Some("owner")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "response_code": 200, "photo_id": id })
    );
}

#[tokio::test]
async fn content_is_served_without_an_installation() {
    let router = router();
    let photo = upload(&router, "owner", "Harbour").await;
    let id = photo["photo_id"].as_i64().unwrap();

    let response = call(&router, Method::GET, &format!("/image/{id}/content"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"\x89PNG");

    let response = call(&router, Method::GET, "/image/999/content", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn health_reports_no_content() {
    let router = router();
    let response = call(&router, Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn malformed_upload_is_a_validation_error() {
    let router = router();
    let body = json!({ "title": "Broken", "image": "%%%" });
    let response = send(&router, request(Method::POST, "/image", Some("owner"), Some(body))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong_shape = json!({ "title": 3 });
    let response = send(
        &router,
        request(Method::POST, "/image", Some("owner"), Some(wrong_shape)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn uploads_are_pushed_to_the_uploader() {
    let router = router();

    let response = call(&router, Method::GET, "/events", Some("owner")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    let mut events = response.into_body();

    upload(&router, "owner", "Harbour").await;

    let frame = tokio::time::timeout(Duration::from_secs(5), events.frame())
        .await
        .expect("event arrives")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: new_photo"));
    assert!(text.contains("\"title\":\"Harbour\""));
    assert!(!text.contains("deleteable"));
}
