//! # HTTP
//!
//! Axum routes exposing the relay endpoints under `/api/v1`.
//!
//! | Method | Path                    | Success                                   |
//! |--------|-------------------------|-------------------------------------------|
//! | GET    | `/api/v1/requests/auth` | 200, request body, `x-id` session header  |
//! | POST   | `/api/v1/callback`      | 200, `{"id": "<subject>"}`                |
//! | GET    | `/api/v1/status`        | 200 resolved, 200 empty pending, 404      |
//!
//! `BadRequest` errors map to 400, all other errors to 500.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Query, State};
use axum::http::header::{ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::endpoint;
use crate::provider::Provider;
use crate::types::{CallbackRequest, CallbackResponse, IssueRequest, StatusRequest, StatusResponse};
use crate::{Error, Result, bad_request};

/// Response header carrying the session identifier of an issued request.
pub const X_ID: HeaderName = HeaderName::from_static("x-id");

/// Build the relay router.
pub fn router<P>(provider: P) -> Router
where
    P: Provider + 'static,
{
    let api = Router::new()
        .route("/requests/auth", get(auth_request::<P>))
        .route("/callback", post(callback::<P>))
        .route("/status", get(status::<P>));

    Router::new()
        .nest("/api/v1", api)
        .layer(SetResponseHeaderLayer::if_not_present(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(provider)
}

// Issue a new authorization request
async fn auth_request<P: Provider>(State(provider): State<P>) -> Response {
    let response = match endpoint::handle(IssueRequest, &provider).await {
        Ok(response) => response,
        Err(e) => return AxResult::<()>(Err(e)).into_response(),
    };
    let Ok(session_id) = HeaderValue::from_str(&response.session_id) else {
        let err = Error::EncodingError("session id is not a valid header value".to_string());
        return AxResult::<()>(Err(err)).into_response();
    };

    let headers = [
        (X_ID, session_id),
        (ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static("x-id")),
    ];
    (headers, AxResult(Ok(response.request))).into_response()
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

// Wallet posts its proof token as the raw request body
async fn callback<P: Provider>(
    State(provider): State<P>, Query(params): Query<CallbackParams>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> AxResult<CallbackResponse> {
    let token = match read_token(body) {
        Ok(token) => token,
        Err(e) => return AxResult(Err(e)),
    };
    let request = CallbackRequest {
        session_id: params.session_id.unwrap_or_default(),
        token,
    };
    endpoint::handle(request, &provider).await.into()
}

fn read_token(body: std::result::Result<Bytes, BytesRejection>) -> Result<String> {
    let bytes = body.map_err(|e| bad_request!("can't read request body: {e}"))?;
    String::from_utf8(bytes.to_vec()).map_err(|e| bad_request!("can't read request body: {e}"))
}

#[derive(Debug, Deserialize)]
struct StatusParams {
    id: Option<String>,
}

#[derive(Serialize)]
struct Resolved {
    id: String,
}

// Poll a session's status
async fn status<P: Provider>(
    State(provider): State<P>, Query(params): Query<StatusParams>,
) -> Response {
    let request = StatusRequest {
        id: params.id.unwrap_or_default(),
    };
    match endpoint::handle(request, &provider).await {
        Ok(StatusResponse::NotFound) => {
            let err = Error::SessionNotFound("session not found".to_string());
            (StatusCode::NOT_FOUND, Json(err.to_json())).into_response()
        }
        Ok(StatusResponse::Pending) => StatusCode::OK.into_response(),
        Ok(StatusResponse::Resolved { id }) => AxResult(Ok(Resolved { id })).into_response(),
        Err(e) => AxResult::<()>(Err(e)).into_response(),
    }
}

// ----------------------------------------------------------------------------
// Axum Response
// ----------------------------------------------------------------------------

/// Axum response wrapper
pub struct AxResult<T>(Result<T>);

impl<T> IntoResponse for AxResult<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let body = self.0.and_then(|v| {
            serde_json::to_value(v).map_err(|e| Error::EncodingError(e.to_string()))
        });
        match body {
            Ok(v) => (StatusCode::OK, Json(v)).into_response(),
            Err(e) => (status_code(&e), Json(e.to_json())).into_response(),
        }
    }
}

impl<T> From<Result<T>> for AxResult<T> {
    fn from(val: Result<T>) -> Self {
        Self(val)
    }
}

const fn status_code(err: &Error) -> StatusCode {
    match err {
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status() {
        assert_eq!(status_code(&bad_request!("missing id")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_code(&Error::VerificationFailed("bad proof".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_code(&Error::SessionNotFound("42".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_utf8_body() {
        let err = read_token(Ok(Bytes::from_static(&[0xff, 0xfe]))).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }
}
