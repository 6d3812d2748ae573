//! Tests for the HTTP routes

mod utils;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, Response, StatusCode, header};
use idv_relay::AuthorizationRequest;
use idv_relay::http::router;
use rstest::rstest;
use serde_json::{Value, json};
use test_relay::{ProviderImpl, SUBJECT, valid_token};
use tower::ServiceExt;
use utils::provider;

async fn send(provider: &ProviderImpl, request: Request<Body>) -> Response<Body> {
    router(provider.clone()).oneshot(request).await.expect("router is infallible")
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.expect("body is readable").to_vec()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request is valid")
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder().method(Method::POST).uri(uri).body(body.into()).expect("request is valid")
}

// issue a request, returning the session id from the `x-id` header
async fn issue(provider: &ProviderImpl) -> String {
    let response = send(provider, get("/api/v1/requests/auth")).await;
    assert_eq!(response.status(), StatusCode::OK);
    response.headers()["x-id"].to_str().expect("header is ascii").to_string()
}

#[rstest]
#[tokio::test]
async fn auth_request(provider: ProviderImpl) {
    let response = send(&provider, get("/api/v1/requests/auth")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(headers[header::ACCESS_CONTROL_EXPOSE_HEADERS], "x-id");
    assert!(headers.contains_key("x-request-id"));
    let session_id = headers["x-id"].to_str().expect("header is ascii").to_string();

    let request: AuthorizationRequest =
        serde_json::from_slice(&body_bytes(response).await).expect("body is a request");
    assert!(request.body.callback_url.ends_with(&format!("/api/v1/callback?sessionId={session_id}")));
}

#[rstest]
#[tokio::test]
async fn full_flow(provider: ProviderImpl) {
    let session_id = issue(&provider).await;

    // pending is 200 with an empty body
    let response = send(&provider, get(&format!("/api/v1/status?id={session_id}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());

    let uri = format!("/api/v1/callback?sessionId={session_id}");
    let response = send(&provider, post(&uri, valid_token(SUBJECT))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).expect("json body");
    assert_eq!(body, json!({"id": SUBJECT}));

    let response = send(&provider, get(&format!("/api/v1/status?id={session_id}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).expect("json body");
    assert_eq!(body, json!({"id": SUBJECT}));
}

#[rstest]
#[tokio::test]
async fn status_not_found(provider: ProviderImpl) {
    let response = send(&provider, get("/api/v1/status?id=never-issued")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn status_missing_id(provider: ProviderImpl) {
    let response = send(&provider, get("/api/v1/status")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_slice(&body_bytes(response).await).expect("json body");
    assert_eq!(body["error"], "invalid_request");
}

#[rstest]
#[tokio::test]
async fn callback_rejected(provider: ProviderImpl) {
    let session_id = issue(&provider).await;

    let uri = format!("/api/v1/callback?sessionId={session_id}");
    let response = send(&provider, post(&uri, "garbled")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = serde_json::from_slice(&body_bytes(response).await).expect("json body");
    assert_eq!(body["error"], "verification_failed");
}

#[rstest]
#[tokio::test]
async fn callback_unknown_session(provider: ProviderImpl) {
    let response =
        send(&provider, post("/api/v1/callback?sessionId=never-issued", valid_token(SUBJECT)))
            .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = serde_json::from_slice(&body_bytes(response).await).expect("json body");
    assert_eq!(body["error"], "session_not_found");
}

#[rstest]
#[tokio::test]
async fn callback_unreadable_body(provider: ProviderImpl) {
    let session_id = issue(&provider).await;

    let uri = format!("/api/v1/callback?sessionId={session_id}");
    let response = send(&provider, post(&uri, vec![0xff_u8, 0xfe, 0xfd])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn cors_preflight(provider: ProviderImpl) {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/requests/auth")
        .header(header::ORIGIN, "https://app.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .expect("request is valid");
    let response = send(&provider, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}
