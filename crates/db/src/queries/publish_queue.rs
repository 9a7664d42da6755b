//! Publish queue operations.
//!
//! One row per platform job. Draining workers coordinate only through this
//! table: a job is claimed with the conditional update in
//! [`lock_and_process`], and a claim that is never finished expires on its
//! own once `lease_expires_at` passes.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::{
    PlatformStat, Priority, ProcessingStat, QueueItem, QueueItemWithPost, QueueStatus,
};
use smo_core::types::{HealthMetrics, QueueStats};

pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;
pub const DEFAULT_LOCK_TIMEOUT_SECS: i64 = 300;

macro_rules! select_items {
    ($($tail:literal),*) => {
        concat!(
            r#"
            SELECT id, scheduled_post_id, platform_slug, priority, scheduled_for, status,
                   attempts, max_attempts, error_message, lease_expires_at, completed_at,
                   created_at, updated_at
            FROM publish_queue
            "#,
            $($tail),*
        )
    };
}

macro_rules! select_items_with_post {
    ($($tail:literal),*) => {
        concat!(
            r#"
            SELECT q.id, q.scheduled_post_id, q.platform_slug, q.priority, q.scheduled_for,
                   q.status, q.attempts, q.max_attempts, q.error_message, q.lease_expires_at,
                   q.completed_at, q.created_at, q.updated_at,
                   p.title, p.content, p.scheduled_time
            FROM publish_queue q
            JOIN scheduled_posts p ON p.id = q.scheduled_post_id
            "#,
            $($tail),*
        )
    };
}

#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub scheduled_post_id: i64,
    pub platform_slug: String,
    pub priority: Priority,
    pub scheduled_for: DateTime<Utc>,
    pub max_attempts: i32,
}

impl NewQueueItem {
    /// A normal-priority job due immediately, with the default attempt budget.
    pub fn new(scheduled_post_id: i64, platform_slug: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            scheduled_post_id,
            platform_slug: platform_slug.into(),
            priority: Priority::Normal,
            scheduled_for: now,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn scheduled_for(mut self, scheduled_for: DateTime<Utc>) -> Self {
        self.scheduled_for = scheduled_for;
        self
    }
}

/// Create a pending job with no attempts recorded.
pub async fn add_to_queue<'e, E>(
    executor: E,
    item: &NewQueueItem,
    now: DateTime<Utc>,
) -> Result<QueueItem, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, QueueItem>(
        r#"
        INSERT INTO publish_queue
            (scheduled_post_id, platform_slug, priority, scheduled_for, status,
             attempts, max_attempts, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'pending', 0, ?, ?, ?)
        RETURNING id, scheduled_post_id, platform_slug, priority, scheduled_for, status,
                  attempts, max_attempts, error_message, lease_expires_at, completed_at,
                  created_at, updated_at
        "#,
    )
    .bind(item.scheduled_post_id)
    .bind(&item.platform_slug)
    .bind(item.priority)
    .bind(item.scheduled_for)
    .bind(item.max_attempts)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(select_items!("WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Due pending jobs, highest priority first, then oldest first.
pub async fn get_pending_items(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(select_items!(
        "WHERE status = 'pending' AND scheduled_for <= ? ",
        "ORDER BY priority DESC, created_at ASC, id ASC ",
        "LIMIT ?"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn get_next_item(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Option<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(select_items!(
        "WHERE status = 'pending' AND scheduled_for <= ? ",
        "ORDER BY priority DESC, created_at ASC, id ASC ",
        "LIMIT 1"
    ))
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn list_by_scheduled_post(
    pool: &SqlitePool,
    scheduled_post_id: i64,
) -> Result<Vec<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(select_items!(
        "WHERE scheduled_post_id = ? ",
        "ORDER BY id ASC"
    ))
    .bind(scheduled_post_id)
    .fetch_all(pool)
    .await
}

/// Set a job's status.
///
/// `error_message` and `completed_at` are only written when supplied; `None`
/// keeps the stored value. Any status other than `processing` releases the
/// lease. This does not check lease ownership.
pub async fn update_status<'e, E>(
    executor: E,
    id: i64,
    status: QueueStatus,
    error_message: Option<&str>,
    completed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE publish_queue
        SET status = ?,
            error_message = COALESCE(?, error_message),
            completed_at = COALESCE(?, completed_at),
            lease_expires_at = CASE WHEN ? = 'processing' THEN lease_expires_at ELSE NULL END,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(error_message)
    .bind(completed_at)
    .bind(status)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Bump the attempt counter in a single statement and return the new value.
pub async fn increment_attempts(
    pool: &SqlitePool,
    id: i64,
    now: DateTime<Utc>,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE publish_queue
        SET attempts = attempts + 1, updated_at = ?
        WHERE id = ?
        RETURNING attempts
        "#,
    )
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Park a failed attempt until `scheduled_for`, when it becomes due again.
pub async fn schedule_retry(
    pool: &SqlitePool,
    id: i64,
    scheduled_for: DateTime<Utc>,
    error_message: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE publish_queue
        SET status = 'retry',
            scheduled_for = ?,
            error_message = ?,
            lease_expires_at = NULL,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(scheduled_for)
    .bind(error_message)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Per-status counts; buckets with no rows are zero.
pub async fn get_queue_stats(pool: &SqlitePool) -> Result<QueueStats, sqlx::Error> {
    let rows = sqlx::query_as::<_, (QueueStatus, i64)>(
        r#"
        SELECT status, COUNT(*)
        FROM publish_queue
        GROUP BY status
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut stats = QueueStats::default();
    for (status, count) in rows {
        stats.add(status, count);
    }
    Ok(stats)
}

pub async fn get_items_by_status(
    pool: &SqlitePool,
    status: QueueStatus,
    limit: i64,
    offset: i64,
) -> Result<Vec<QueueItemWithPost>, sqlx::Error> {
    sqlx::query_as::<_, QueueItemWithPost>(select_items_with_post!(
        "WHERE q.status = ? ",
        "ORDER BY q.created_at DESC, q.id DESC ",
        "LIMIT ? OFFSET ?"
    ))
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Jobs waiting in `retry` whose next attempt is due.
pub async fn get_failed_items_for_retry(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<QueueItemWithPost>, sqlx::Error> {
    sqlx::query_as::<_, QueueItemWithPost>(select_items_with_post!(
        "WHERE q.status = 'retry' AND q.scheduled_for <= ? ",
        "ORDER BY q.priority DESC, q.scheduled_for ASC, q.id ASC"
    ))
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Jobs stuck in `processing` whose lease ran out, oldest lease first.
pub async fn get_expired_leases(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(select_items!(
        "WHERE status = 'processing' ",
        "AND (lease_expires_at IS NULL OR lease_expires_at <= ?) ",
        "ORDER BY lease_expires_at ASC, id ASC ",
        "LIMIT ?"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// `now - days`, or `None` when the window reaches past the representable range.
fn window_start(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|window| now.checked_sub_signed(window))
}

/// Delete completed and failed jobs that finished more than `days` ago.
pub async fn cleanup_completed_items(
    pool: &SqlitePool,
    days: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let Some(cutoff) = window_start(now, days) else {
        return Ok(0);
    };
    let result = sqlx::query(
        r#"
        DELETE FROM publish_queue
        WHERE status IN ('completed', 'failed')
          AND completed_at IS NOT NULL
          AND completed_at < ?
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Daily throughput and mean enqueue-to-completion time, by completion day.
pub async fn get_processing_stats(
    pool: &SqlitePool,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<ProcessingStat>, sqlx::Error> {
    let cutoff = window_start(now, days);
    sqlx::query_as::<_, ProcessingStat>(
        r#"
        SELECT date(completed_at) AS day,
               COUNT(*) AS total_items,
               AVG((julianday(completed_at) - julianday(created_at)) * 86400.0)
                   AS avg_processing_time_seconds
        FROM publish_queue
        WHERE status = 'completed'
          AND completed_at IS NOT NULL
          AND (? IS NULL OR completed_at >= ?)
        GROUP BY date(completed_at)
        ORDER BY day DESC
        "#,
    )
    .bind(cutoff)
    .bind(cutoff)
    .fetch_all(pool)
    .await
}

/// Job counts per platform and status for jobs created in the last `days`.
pub async fn get_platform_stats(
    pool: &SqlitePool,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<PlatformStat>, sqlx::Error> {
    let cutoff = window_start(now, days);
    sqlx::query_as::<_, PlatformStat>(
        r#"
        SELECT platform_slug, status, COUNT(*) AS count
        FROM publish_queue
        WHERE (? IS NULL OR created_at >= ?)
        GROUP BY platform_slug, status
        ORDER BY platform_slug, status
        "#,
    )
    .bind(cutoff)
    .bind(cutoff)
    .fetch_all(pool)
    .await
}

/// Move every `failed` job back to `pending` with a fresh attempt budget.
///
/// Jobs in `retry` are left alone.
pub async fn reschedule_failed_items(
    pool: &SqlitePool,
    new_scheduled_for: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE publish_queue
        SET status = 'pending',
            attempts = 0,
            error_message = NULL,
            completed_at = NULL,
            lease_expires_at = NULL,
            scheduled_for = ?,
            updated_at = ?
        WHERE status = 'failed'
        "#,
    )
    .bind(new_scheduled_for)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Cancel every unfinished job of a scheduled post.
pub async fn cancel_post_queue_items<'e, E>(
    executor: E,
    scheduled_post_id: i64,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE publish_queue
        SET status = 'cancelled',
            lease_expires_at = NULL,
            updated_at = ?
        WHERE scheduled_post_id = ?
          AND status IN ('pending', 'processing', 'retry')
        "#,
    )
    .bind(now)
    .bind(scheduled_post_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Claim a job for processing.
///
/// A single conditional update moves the job to `processing` with a lease
/// ending `lock_timeout_secs` from `now`. It only matches jobs that are
/// `pending` or `retry`, or `processing` with a lease that has already run
/// out. Returns true iff this caller won the claim.
pub async fn lock_and_process(
    pool: &SqlitePool,
    id: i64,
    now: DateTime<Utc>,
    lock_timeout_secs: i64,
) -> Result<bool, sqlx::Error> {
    let lease_expires_at = now + Duration::seconds(lock_timeout_secs);
    let result = sqlx::query(
        r#"
        UPDATE publish_queue
        SET status = 'processing',
            lease_expires_at = ?,
            updated_at = ?
        WHERE id = ?
          AND (
                status IN ('pending', 'retry')
                OR (status = 'processing'
                    AND (lease_expires_at IS NULL OR lease_expires_at <= ?))
              )
        "#,
    )
    .bind(lease_expires_at)
    .bind(now)
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn get_health_metrics(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<HealthMetrics, sqlx::Error> {
    let (total_items, failed_items) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
        FROM publish_queue
        "#,
    )
    .fetch_one(pool)
    .await?;

    let oldest_pending = sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        SELECT created_at
        FROM publish_queue
        WHERE status = 'pending'
        ORDER BY created_at ASC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    let avg_processing_time = sqlx::query_scalar::<_, Option<f64>>(
        r#"
        SELECT AVG((julianday(completed_at) - julianday(created_at)) * 86400.0)
        FROM publish_queue
        WHERE status = 'completed'
          AND completed_at IS NOT NULL
          AND completed_at >= ?
        "#,
    )
    .bind(now - Duration::days(1))
    .fetch_one(pool)
    .await?;

    Ok(HealthMetrics {
        total_items,
        oldest_pending_minutes: oldest_pending.map(|at| (now - at).num_minutes()),
        failed_items,
        avg_processing_time,
        measured_at: now,
    })
}
