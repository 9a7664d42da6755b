//! Publish-queue drain: claim due jobs, hand them to a dispatcher, and
//! record the result.

use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use smo_core::retry::retry_delay;
use smo_core::types::{QueueStatus, ScheduledPostStatus};
use smo_db::models::QueueItem;
use smo_db::queries::publish_queue::{self, DEFAULT_LOCK_TIMEOUT_SECS};
use smo_db::queries::scheduled_posts;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::dispatch::{DispatchJob, Dispatcher};
use crate::PublishError;

#[derive(Debug, Clone, Copy)]
pub struct DeliveryOptions {
    pub batch_size: i64,
    pub lock_timeout_secs: i64,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    /// Jobs another worker claimed first.
    pub contended: usize,
}

enum JobResult {
    Completed,
    Retried,
    Failed,
    Contended,
}

/// Run one pass over due pending jobs, due retries, and jobs whose lease
/// expired while `processing`.
pub async fn drain_publish_queue<D: Dispatcher>(
    pool: &SqlitePool,
    dispatcher: &D,
    options: DeliveryOptions,
    now: DateTime<Utc>,
) -> Result<DeliveryReport, PublishError> {
    let batch_size = options.batch_size.max(1);
    let mut candidates = publish_queue::get_pending_items(pool, now, batch_size).await?;

    let remaining = (batch_size as usize).saturating_sub(candidates.len());
    candidates.extend(
        publish_queue::get_failed_items_for_retry(pool, now)
            .await?
            .into_iter()
            .take(remaining)
            .map(|row| row.item),
    );

    let remaining = (batch_size as usize).saturating_sub(candidates.len());
    if remaining > 0 {
        let stale = publish_queue::get_expired_leases(pool, now, remaining as i64).await?;
        for item in &stale {
            warn!(queue_id = item.id, platform = %item.platform_slug, "reclaiming expired lease");
        }
        candidates.extend(stale);
    }

    let mut report = DeliveryReport::default();
    for item in candidates {
        match deliver_one(pool, dispatcher, &item, options, now).await {
            Ok(JobResult::Completed) => report.completed += 1,
            Ok(JobResult::Retried) => report.retried += 1,
            Ok(JobResult::Failed) => report.failed += 1,
            Ok(JobResult::Contended) => report.contended += 1,
            Err(err) => {
                report.failed += 1;
                error!(queue_id = item.id, error = %err, "publish job bookkeeping failed");
            }
        }
    }

    if report != DeliveryReport::default() {
        info!(
            completed = report.completed,
            retried = report.retried,
            failed = report.failed,
            contended = report.contended,
            "publish queue drain finished"
        );
    }
    Ok(report)
}

async fn deliver_one<D: Dispatcher>(
    pool: &SqlitePool,
    dispatcher: &D,
    item: &QueueItem,
    options: DeliveryOptions,
    now: DateTime<Utc>,
) -> Result<JobResult, PublishError> {
    if !publish_queue::lock_and_process(pool, item.id, now, options.lock_timeout_secs).await? {
        debug!(queue_id = item.id, "job already claimed");
        return Ok(JobResult::Contended);
    }

    let Some(attempts) = publish_queue::increment_attempts(pool, item.id, now).await? else {
        return Ok(JobResult::Contended);
    };

    let Some(post) = scheduled_posts::get_by_id(pool, item.scheduled_post_id).await? else {
        publish_queue::update_status(
            pool,
            item.id,
            QueueStatus::Failed,
            Some("scheduled post not found"),
            Some(now),
            now,
        )
        .await?;
        return Ok(JobResult::Failed);
    };
    let media_ids = scheduled_posts::media_for(pool, post.id).await?;

    let job = DispatchJob {
        delivery_id: DispatchJob::new_delivery_id(),
        queue_id: item.id,
        scheduled_post_id: post.id,
        platform: item.platform_slug.clone(),
        title: post.title,
        content: post.content,
        media_ids,
        scheduled_time: post.scheduled_time,
        attempt: attempts,
    };

    let start = Instant::now();
    let result = dispatcher.dispatch(&job).await;
    let elapsed = Duration::from_std(start.elapsed()).unwrap_or_else(|_| Duration::zero());

    match result {
        Ok(()) => {
            let finished = now + elapsed;
            publish_queue::update_status(
                pool,
                item.id,
                QueueStatus::Completed,
                None,
                Some(finished),
                finished,
            )
            .await?;
            scheduled_posts::update_status(pool, post.id, ScheduledPostStatus::Published, finished)
                .await?;
            info!(
                queue_id = item.id,
                platform = %item.platform_slug,
                delivery_id = %job.delivery_id,
                "publish job completed"
            );
            Ok(JobResult::Completed)
        }
        Err(err) => {
            let message = err.to_string();
            if attempts < item.max_attempts {
                let delay = Duration::from_std(retry_delay(attempts as u32))
                    .unwrap_or_else(|_| Duration::zero());
                publish_queue::schedule_retry(pool, item.id, now + delay, &message, now).await?;
                warn!(
                    queue_id = item.id,
                    platform = %item.platform_slug,
                    attempts,
                    error = %message,
                    "publish job failed, retry scheduled"
                );
                Ok(JobResult::Retried)
            } else {
                publish_queue::update_status(
                    pool,
                    item.id,
                    QueueStatus::Failed,
                    Some(&message),
                    Some(now),
                    now,
                )
                .await?;
                scheduled_posts::update_status(pool, post.id, ScheduledPostStatus::Failed, now)
                    .await?;
                error!(
                    queue_id = item.id,
                    platform = %item.platform_slug,
                    attempts,
                    error = %message,
                    "publish job failed permanently"
                );
                Ok(JobResult::Failed)
            }
        }
    }
}
