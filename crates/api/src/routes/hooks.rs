//! Content lifecycle hooks called by the host CMS.
//!
//! Each hook is fire-and-forget from the caller's point of view: problems
//! with an individual item are logged and the hook still answers 202.

use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use smo_core::types::{ContentItem, ContentStatus};

use crate::{
    error::ApiResult,
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/hooks/content-published", post(content_published))
        .route("/v1/hooks/content-updated", post(content_updated))
        .route("/v1/hooks/content-unpublished", post(content_unpublished))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentPublishedRequest {
    content: ContentItem,
    #[serde(default)]
    is_update: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentUpdatedRequest {
    content: ContentItem,
    previous_status: ContentStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentUnpublishedRequest {
    content_id: i64,
}

#[derive(Debug, Serialize)]
struct AcceptedResponse {
    status: &'static str,
}

fn accepted() -> (StatusCode, Json<AcceptedResponse>) {
    (StatusCode::ACCEPTED, Json(AcceptedResponse { status: "accepted" }))
}

async fn content_published(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(payload): Json<ContentPublishedRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let manager = state.manager().await.map_err(|err| request_id.internal(err))?;
    manager
        .on_content_published(&payload.content, payload.is_update)
        .await;
    Ok(accepted())
}

async fn content_updated(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(payload): Json<ContentUpdatedRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let manager = state.manager().await.map_err(|err| request_id.internal(err))?;
    manager
        .on_content_updated(&payload.content, payload.previous_status)
        .await;
    Ok(accepted())
}

async fn content_unpublished(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(payload): Json<ContentUnpublishedRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let manager = state.manager().await.map_err(|err| request_id.internal(err))?;
    manager.on_content_unpublished(payload.content_id).await;
    Ok(accepted())
}
