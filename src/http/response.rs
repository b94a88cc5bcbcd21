//! Response construction helpers.
//!
//! # Responsibilities
//! - Build the gateway's own responses (CORS answers, 502s, 404s)
//! - Merge gateway headers into upstream responses
//!
//! # Design Decisions
//! - Gateway headers never overwrite a header the upstream already set
//! - Error responses are `text/plain`

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Copy `extra` into `target` for names `target` does not already carry.
pub fn merge_missing(target: &mut HeaderMap, extra: &HeaderMap) {
    for name in extra.keys() {
        if target.contains_key(name) {
            continue;
        }
        for value in extra.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}

/// Empty-bodied response carrying `headers`.
pub fn empty(status: StatusCode, headers: HeaderMap) -> Response {
    (status, headers, Body::empty()).into_response()
}

/// `text/plain` response with a fixed message.
pub fn plain(status: StatusCode, message: &'static str) -> Response {
    (
        status,
        [(CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
        message,
    )
        .into_response()
}

/// The upstream could not be reached: 502, `text/plain`, empty body.
pub fn bad_gateway() -> Response {
    plain(StatusCode::BAD_GATEWAY, "")
}
