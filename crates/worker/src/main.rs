use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use smo_autopublish::dispatch::{Dispatcher, WebhookDispatcher};
use smo_core::config::Settings;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

mod jobs;

#[derive(Debug, Parser)]
#[command(name = "smo-worker", about = "Periodic driver for the auto-publish queues")]
struct Args {
    /// Run a single tick and exit.
    #[arg(long)]
    once: bool,
}

pub struct WorkerState<D: Dispatcher = WebhookDispatcher> {
    pub db: SqlitePool,
    pub dispatcher: Option<D>,
    pub config: Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();
    let config = Settings::from_env()?;

    let db = smo_db::connect(&config.database_url, 5).await?;

    let dispatcher = match config.dispatch_url.as_deref() {
        Some(url) => {
            if config.dispatch_secret.is_empty() {
                warn!("SMO_DISPATCH_SECRET is empty, dispatched payloads are signed with an empty key");
            }
            Some(WebhookDispatcher::new(url, config.dispatch_secret.clone())?)
        }
        None => None,
    };

    let state = WorkerState {
        db,
        dispatcher,
        config,
    };

    if args.once {
        let report = jobs::tick::run_tick(&state, Utc::now()).await?;
        info!(?report, "tick finished");
        return Ok(());
    }

    info!(
        interval_secs = state.config.drain_interval.as_secs(),
        dispatch = state.dispatcher.is_some(),
        "worker starting"
    );

    let mut interval = tokio::time::interval(state.config.drain_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = jobs::tick::run_tick(&state, Utc::now()).await {
                    error!(error = %err, "tick failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    state.db.close().await;
    Ok(())
}
