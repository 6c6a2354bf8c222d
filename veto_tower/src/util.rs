//! Utilities for generating HTTP responses on authorization failures

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Response, StatusCode};
use serde::Serialize;

#[derive(Serialize)]
struct AccessDeniedBody<'a> {
    message: &'a str,
}

/// Build a `403 Forbidden` response describing a denied action
///
/// The response body is negotiated against the request's `Accept` header.
/// When the request accepts JSON (including an absent or wildcard `Accept`),
/// the body is
///
/// ```json
/// { "message": "Access Denied - You don't have permission to: <action>" }
/// ```
///
/// Otherwise the same sentence is returned as `text/plain`.
pub fn access_denied<Body: From<Bytes>>(headers: &HeaderMap, action: &str) -> Response<Body> {
    let message = format!("Access Denied - You don't have permission to: {action}");

    let (content_type, payload) = if accepts_json(headers) {
        let body = serde_json::to_vec(&AccessDeniedBody { message: &message })
            .expect("serializing a plain message cannot fail");
        (
            HeaderValue::from_static("application/json; charset=utf-8"),
            Bytes::from(body),
        )
    } else {
        (
            HeaderValue::from_static("text/plain; charset=utf-8"),
            Bytes::from(message),
        )
    };

    Response::builder()
        .status(StatusCode::FORBIDDEN)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(payload))
        .expect("response to build successfully")
}

/// Build a response with the given status and an empty body
pub fn empty_status<Body: Default>(status: StatusCode) -> Response<Body> {
    let mut resp = Response::new(Body::default());
    *resp.status_mut() = status;
    resp
}

// An absent Accept header is treated as `*/*`, which negotiates to JSON,
// matching the behavior of content negotiation in common web frameworks.
fn accepts_json(headers: &HeaderMap) -> bool {
    let accept = match headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        Some(accept) => accept,
        None => return true,
    };

    accept.split(',').any(|candidate| {
        let media_type = candidate
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        media_type == "*/*"
            || media_type == "application/json"
            || media_type == "text/json"
            || media_type.ends_with("+json")
    })
}
