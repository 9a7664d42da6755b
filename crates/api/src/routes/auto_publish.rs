use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use smo_autopublish::DrainReport;
use smo_core::types::{AutoPublishStats, ItemOutcome};
use smo_db::models::{AutoPublishItem, ScheduledPost};
use smo_db::queries::scheduled_posts;

use crate::{
    error::{ApiResult, AppError},
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/auto-publish/stats", get(stats))
        .route("/v1/auto-publish/drain", post(drain))
        .route(
            "/v1/auto-publish/items/{id}",
            get(get_item).delete(delete_item),
        )
        .route("/v1/auto-publish/items/{id}/retry", post(retry_item))
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemResponse {
    item: AutoPublishItem,
    outcome: ItemOutcome,
    scheduled_posts: Vec<ScheduledPost>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteItemResponse {
    id: i64,
    deleted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetryItemResponse {
    id: i64,
    status: &'static str,
}

async fn stats(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<AutoPublishStats>> {
    let manager = state.manager().await.map_err(|err| request_id.internal(err))?;
    let stats = manager
        .get_queue_stats(Utc::now())
        .await
        .map_err(|err| request_id.publish_error(err))?;
    Ok(Json(stats))
}

async fn drain(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<DrainReport>> {
    let manager = state.manager().await.map_err(|err| request_id.internal(err))?;
    let report = manager
        .drain_due_items(Utc::now())
        .await
        .map_err(|err| request_id.publish_error(err))?;
    Ok(Json(report))
}

async fn get_item(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ItemResponse>> {
    let manager = state.manager().await.map_err(|err| request_id.internal(err))?;
    let (item, outcome) = manager
        .get_item(id)
        .await
        .map_err(|err| request_id.publish_error(err))?
        .ok_or_else(|| {
            AppError::NotFound(format!("auto-publish item {id}")).with_request_id(&request_id.0)
        })?;
    let scheduled_posts = scheduled_posts::list_by_parent(&state.db, id)
        .await
        .map_err(|err| request_id.internal(err))?;

    Ok(Json(ItemResponse {
        item,
        outcome,
        scheduled_posts,
    }))
}

async fn delete_item(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeleteItemResponse>> {
    let manager = state.manager().await.map_err(|err| request_id.internal(err))?;
    let deleted = manager
        .remove_from_queue(id, Utc::now())
        .await
        .map_err(|err| request_id.publish_error(err))?;
    if !deleted {
        return Err(
            AppError::NotFound(format!("auto-publish item {id}")).with_request_id(&request_id.0)
        );
    }
    Ok(Json(DeleteItemResponse { id, deleted }))
}

async fn retry_item(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> ApiResult<Json<RetryItemResponse>> {
    let manager = state.manager().await.map_err(|err| request_id.internal(err))?;
    if manager
        .get_item(id)
        .await
        .map_err(|err| request_id.publish_error(err))?
        .is_none()
    {
        return Err(
            AppError::NotFound(format!("auto-publish item {id}")).with_request_id(&request_id.0)
        );
    }

    let retried = manager
        .retry_failed_item(id, Utc::now())
        .await
        .map_err(|err| request_id.publish_error(err))?;
    if !retried {
        return Err(AppError::BadRequest("only failed items can be retried".to_string())
            .with_request_id(&request_id.0));
    }
    Ok(Json(RetryItemResponse {
        id,
        status: "pending",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support;
    use smo_autopublish::AutoPublishManager;
    use smo_core::settings::AutoPublishSettings;
    use smo_core::types::TriggerReason;

    async fn seeded() -> (AppState, i64) {
        let state = test_support::state().await;
        let manager = AutoPublishManager::new(
            state.db.clone(),
            AutoPublishSettings {
                enabled: true,
                platforms: vec!["twitter".into()],
                delay_minutes: 60,
                ..AutoPublishSettings::default()
            },
        );
        let item = manager
            .try_enqueue(&test_support::content(8), TriggerReason::New, Utc::now())
            .await
            .unwrap();
        (state, item.id)
    }

    #[tokio::test]
    async fn test_get_item_reports_pending_outcome() {
        let (state, id) = seeded().await;
        let Json(resp) = get_item(State(state), Extension(test_support::request_id()), Path(id))
            .await
            .unwrap();
        assert_eq!(resp.item.id, id);
        assert_eq!(resp.outcome, ItemOutcome::Pending);
        assert!(resp.scheduled_posts.is_empty());
    }

    #[tokio::test]
    async fn test_missing_item_is_not_found() {
        let state = test_support::state().await;
        let err = get_item(State(state), Extension(test_support::request_id()), Path(404))
            .await
            .unwrap_err();
        assert!(matches!(err.error, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_retry_rejects_pending_item() {
        let (state, id) = seeded().await;
        let err = retry_item(State(state), Extension(test_support::request_id()), Path(id))
            .await
            .unwrap_err();
        assert!(matches!(err.error, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_delete_then_delete_again() {
        let (state, id) = seeded().await;
        let Json(resp) = delete_item(
            State(state.clone()),
            Extension(test_support::request_id()),
            Path(id),
        )
        .await
        .unwrap();
        assert!(resp.deleted);

        let err = delete_item(State(state), Extension(test_support::request_id()), Path(id))
            .await
            .unwrap_err();
        assert!(matches!(err.error, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stats_count_items() {
        let (state, _) = seeded().await;
        let Json(stats) = stats(State(state), Extension(test_support::request_id()))
            .await
            .unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pending, 1);
    }
}
