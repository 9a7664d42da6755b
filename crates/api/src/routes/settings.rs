use axum::{extract::State, routing::get, Extension, Json, Router};
use chrono::Utc;
use serde_json::Value;
use smo_core::settings::AutoPublishSettings;

use crate::{
    error::ApiResult,
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/settings", get(get_settings).patch(update_settings))
        .with_state(state)
}

async fn get_settings(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<AutoPublishSettings>> {
    let settings = smo_autopublish::settings::load(&state.db)
        .await
        .map_err(|err| request_id.internal(err))?;
    Ok(Json(settings))
}

/// Merge a partial policy into the stored one; nothing is written unless the
/// merged policy is valid.
async fn update_settings(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(patch): Json<Value>,
) -> ApiResult<Json<AutoPublishSettings>> {
    let updated = smo_autopublish::settings::update(&state.db, &patch, Utc::now())
        .await
        .map_err(|err| request_id.publish_error(err))?;
    Ok(Json(updated))
}
