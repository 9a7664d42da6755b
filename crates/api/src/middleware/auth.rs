use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use smo_core::auth::token_matches;

use crate::{
    error::{ApiError, AppError},
    state::{AppState, RequestId},
};

/// Require `Authorization: Bearer <SMO_API_TOKEN>` when a token is configured.
pub async fn api_token_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.api_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(parse_bearer)
        .ok_or_else(|| AppError::Unauthorized.with_request_id(&request_id))?;

    if !token_matches(expected, presented) {
        tracing::warn!(request_id = %request_id, "rejected request with invalid api token");
        return Err(AppError::Unauthorized.with_request_id(&request_id));
    }

    Ok(next.run(req).await)
}

fn parse_bearer(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let mut parts = value.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();
    if scheme != "Bearer" || token.is_empty() {
        return None;
    }
    Some(token)
}
