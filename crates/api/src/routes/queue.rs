use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smo_core::config::MAX_DAYS;
use smo_core::types::{HealthMetrics, QueueStats, QueueStatus};
use smo_db::models::{PlatformStat, ProcessingStat, QueueItemWithPost};
use smo_db::queries::publish_queue;

use crate::{
    error::{ApiResult, AppError},
    state::{AppState, RequestId},
};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;
const DEFAULT_STATS_DAYS: i64 = 30;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/queue/stats", get(queue_stats))
        .route("/v1/queue/health", get(queue_health))
        .route("/v1/queue/items", get(list_items))
        .route("/v1/queue/retry-due", get(retry_due))
        .route("/v1/queue/processing-stats", get(processing_stats))
        .route("/v1/queue/platform-stats", get(platform_stats))
        .route("/v1/queue/reschedule-failed", post(reschedule_failed))
        .route("/v1/queue/cleanup", post(cleanup))
        .route("/v1/scheduled-posts/{id}/cancel", post(cancel_scheduled_post))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListItemsQuery {
    status: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DaysQuery {
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RescheduleRequest {
    scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CleanupRequest {
    days: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemsResponse {
    items: Vec<QueueItemWithPost>,
    limit: i64,
    offset: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AffectedResponse {
    affected: u64,
}

fn positive_days(days: Option<i64>, default: i64, request_id: &RequestId) -> ApiResult<i64> {
    match days.unwrap_or(default) {
        days if (1..=MAX_DAYS).contains(&days) => Ok(days),
        _ => Err(AppError::BadRequest(format!("days must be between 1 and {MAX_DAYS}"))
            .with_request_id(&request_id.0)),
    }
}

async fn queue_stats(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<QueueStats>> {
    let stats = publish_queue::get_queue_stats(&state.db)
        .await
        .map_err(|err| request_id.internal(err))?;
    Ok(Json(stats))
}

async fn queue_health(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<HealthMetrics>> {
    let metrics = publish_queue::get_health_metrics(&state.db, Utc::now())
        .await
        .map_err(|err| request_id.internal(err))?;
    Ok(Json(metrics))
}

async fn list_items(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<ListItemsQuery>,
) -> ApiResult<Json<ItemsResponse>> {
    let status = match query.status.as_deref() {
        Some(raw) => QueueStatus::from_str(raw).map_err(|err| {
            AppError::BadRequest(err.to_string()).with_request_id(&request_id.0)
        })?,
        None => QueueStatus::Pending,
    };
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let items = publish_queue::get_items_by_status(&state.db, status, limit, offset)
        .await
        .map_err(|err| request_id.internal(err))?;
    Ok(Json(ItemsResponse {
        items,
        limit,
        offset,
    }))
}

async fn retry_due(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<Vec<QueueItemWithPost>>> {
    let items = publish_queue::get_failed_items_for_retry(&state.db, Utc::now())
        .await
        .map_err(|err| request_id.internal(err))?;
    Ok(Json(items))
}

async fn processing_stats(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Json<Vec<ProcessingStat>>> {
    let days = positive_days(query.days, DEFAULT_STATS_DAYS, &request_id)?;
    let stats = publish_queue::get_processing_stats(&state.db, days, Utc::now())
        .await
        .map_err(|err| request_id.internal(err))?;
    Ok(Json(stats))
}

async fn platform_stats(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Json<Vec<PlatformStat>>> {
    let days = positive_days(query.days, DEFAULT_STATS_DAYS, &request_id)?;
    let stats = publish_queue::get_platform_stats(&state.db, days, Utc::now())
        .await
        .map_err(|err| request_id.internal(err))?;
    Ok(Json(stats))
}

async fn reschedule_failed(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(payload): Json<RescheduleRequest>,
) -> ApiResult<Json<AffectedResponse>> {
    let now = Utc::now();
    let affected =
        publish_queue::reschedule_failed_items(&state.db, payload.scheduled_for.unwrap_or(now), now)
            .await
            .map_err(|err| request_id.internal(err))?;
    tracing::info!(affected, "failed publish jobs rescheduled");
    Ok(Json(AffectedResponse { affected }))
}

async fn cleanup(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(payload): Json<CleanupRequest>,
) -> ApiResult<Json<AffectedResponse>> {
    let days = positive_days(payload.days, state.config.retention_days, &request_id)?;
    let affected = publish_queue::cleanup_completed_items(&state.db, days, Utc::now())
        .await
        .map_err(|err| request_id.internal(err))?;
    Ok(Json(AffectedResponse { affected }))
}

async fn cancel_scheduled_post(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> ApiResult<Json<AffectedResponse>> {
    let manager = state.manager().await.map_err(|err| request_id.internal(err))?;
    let affected = manager
        .cancel_scheduled_post(id, Utc::now())
        .await
        .map_err(|err| request_id.publish_error(err))?;
    Ok(Json(AffectedResponse { affected }))
}
