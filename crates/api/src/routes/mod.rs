pub mod auto_publish;
pub mod health;
pub mod hooks;
pub mod queue;
pub mod settings;

use axum::Router;

use crate::state::AppState;

pub fn v1_router(state: AppState) -> Router {
    Router::new()
        .merge(hooks::router(state.clone()))
        .merge(auto_publish::router(state.clone()))
        .merge(queue::router(state.clone()))
        .merge(settings::router(state))
}

pub fn health_router(state: AppState) -> Router {
    health::router(state)
}
