use axum::{middleware::from_fn, middleware::from_fn_with_state, Router};
use smo_core::config::Settings;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod error;
mod middleware;
mod routes;
mod state;

use crate::middleware::{auth::api_token_auth, request_id::request_id};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = Settings::from_env()?;
    if config.api_token.is_none() {
        warn!(env = %config.smo_env, "SMO_API_TOKEN is not set, the v1 API is unauthenticated");
    }

    let db = smo_db::connect(&config.database_url, 10).await?;
    let addr: SocketAddr = config.api_bind.parse()?;

    let state = AppState {
        db,
        config: Arc::new(config),
    };

    let v1 = routes::v1_router(state.clone())
        .layer(from_fn_with_state(state.clone(), api_token_auth));

    let app = Router::new()
        .merge(routes::health_router(state.clone()))
        .merge(v1)
        .layer(from_fn(request_id));

    info!(%addr, "starting api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
