use anyhow::Context;
use chrono::{DateTime, Utc};
use smo_autopublish::delivery::{drain_publish_queue, DeliveryOptions, DeliveryReport};
use smo_autopublish::dispatch::Dispatcher;
use smo_autopublish::{AutoPublishManager, DrainReport};
use smo_db::queries::publish_queue;
use tracing::{debug, info};

use crate::WorkerState;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub auto_publish: DrainReport,
    /// `None` when no dispatcher is configured.
    pub delivery: Option<DeliveryReport>,
    pub cleaned_up: u64,
}

/// One pass of the periodic driver.
///
/// The policy is reloaded every tick so settings changes made through the
/// API take effect without a restart.
pub async fn run_tick<D: Dispatcher>(
    state: &WorkerState<D>,
    now: DateTime<Utc>,
) -> anyhow::Result<TickReport> {
    let manager = AutoPublishManager::load(state.db.clone())
        .await
        .context("failed to load auto-publish settings")?
        .with_batch_size(state.config.drain_batch_size);

    let auto_publish = manager.drain_due_items(now).await?;

    let delivery = match state.dispatcher.as_ref() {
        Some(dispatcher) => {
            let options = DeliveryOptions {
                batch_size: state.config.drain_batch_size,
                lock_timeout_secs: state.config.lock_timeout.as_secs() as i64,
            };
            Some(drain_publish_queue(&state.db, dispatcher, options, now).await?)
        }
        None => {
            debug!("no dispatcher configured, leaving publish queue for another consumer");
            None
        }
    };

    let cleaned_up =
        publish_queue::cleanup_completed_items(&state.db, state.config.retention_days, now).await?;
    if cleaned_up > 0 {
        info!(cleaned_up, "removed finished publish jobs");
    }

    Ok(TickReport {
        auto_publish,
        delivery,
        cleaned_up,
    })
}
