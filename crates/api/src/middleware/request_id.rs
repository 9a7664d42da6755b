use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use nanoid::nanoid;

use crate::state::RequestId;

const HEADER: &str = "X-Request-Id";
const MAX_INBOUND_LEN: usize = 64;

/// Tag each request with an id, reusing the caller's `X-Request-Id` when the
/// CMS already sent a usable one, and echo it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let request_id = resolve(req.headers());
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let mut resp = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(HEADER, value);
    }
    resp
}

fn resolve(headers: &HeaderMap) -> String {
    headers
        .get(HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|id| is_usable(id))
        .map(str::to_string)
        .unwrap_or_else(|| format!("req_{}", nanoid!(16)))
}

fn is_usable(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_INBOUND_LEN
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
