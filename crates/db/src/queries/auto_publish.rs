//! Auto-publish queue operations.
//!
//! One row per qualifying content event. A row stays `pending` until its
//! publish date passes and a drain fans it out into per-platform jobs.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::{AutoPublishItem, NewAutoPublishItem, QueueStatus};
use smo_core::types::AutoPublishStats;

macro_rules! select_items {
    ($($tail:literal),*) => {
        concat!(
            r#"
            SELECT id, post_id, user_id, site_id, trigger_reason, title, content, excerpt,
                   featured_image_id, categories, tags, publish_date, platforms,
                   auto_hashtags, auto_optimize, custom_message, priority, status,
                   retry_count, error_message, actual_publish_date, created_at, updated_at
            FROM auto_publish_queue
            "#,
            $($tail),*
        )
    };
}

pub async fn insert(
    pool: &SqlitePool,
    item: &NewAutoPublishItem,
    now: DateTime<Utc>,
) -> Result<AutoPublishItem, sqlx::Error> {
    sqlx::query_as::<_, AutoPublishItem>(
        r#"
        INSERT INTO auto_publish_queue
            (post_id, user_id, site_id, trigger_reason, title, content, excerpt,
             featured_image_id, categories, tags, publish_date, platforms,
             auto_hashtags, auto_optimize, custom_message, priority, status,
             created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
        RETURNING id, post_id, user_id, site_id, trigger_reason, title, content, excerpt,
                  featured_image_id, categories, tags, publish_date, platforms,
                  auto_hashtags, auto_optimize, custom_message, priority, status,
                  retry_count, error_message, actual_publish_date, created_at, updated_at
        "#,
    )
    .bind(item.post_id)
    .bind(item.user_id)
    .bind(item.site_id)
    .bind(item.trigger_reason)
    .bind(&item.title)
    .bind(&item.content)
    .bind(&item.excerpt)
    .bind(item.featured_image_id)
    .bind(&item.categories)
    .bind(&item.tags)
    .bind(item.publish_date)
    .bind(&item.platforms)
    .bind(item.auto_hashtags)
    .bind(item.auto_optimize)
    .bind(&item.custom_message)
    .bind(item.priority)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<AutoPublishItem>, sqlx::Error> {
    sqlx::query_as::<_, AutoPublishItem>(select_items!("WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Whether an item for this content is still waiting to be fanned out.
pub async fn has_pending_for_post(pool: &SqlitePool, post_id: i64) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM auto_publish_queue
        WHERE post_id = ? AND status = 'pending'
        "#,
    )
    .bind(post_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Pending items whose publish date has passed, most urgent and oldest first.
pub async fn list_due(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<AutoPublishItem>, sqlx::Error> {
    sqlx::query_as::<_, AutoPublishItem>(select_items!(
        "WHERE status = 'pending' AND publish_date <= ? ",
        "ORDER BY priority DESC, publish_date ASC ",
        "LIMIT ?"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn list_by_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<AutoPublishItem>, sqlx::Error> {
    sqlx::query_as::<_, AutoPublishItem>(select_items!(
        "WHERE post_id = ? ",
        "ORDER BY created_at DESC"
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await
}

/// Flip a pending item to `processed`.
///
/// Returns false when the item was not pending, meaning another drain has
/// already claimed it.
pub async fn claim_for_processing<'e, E>(
    executor: E,
    id: i64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE auto_publish_queue
        SET status = 'processed',
            actual_publish_date = ?,
            error_message = NULL,
            updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_failed(
    pool: &SqlitePool,
    id: i64,
    error_message: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE auto_publish_queue
        SET status = 'failed',
            error_message = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(error_message)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Move a still-pending item to `failed` with `reason`, keeping the row.
///
/// Returns false when the item was already claimed or is gone.
pub async fn withdraw_pending(
    pool: &SqlitePool,
    id: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE auto_publish_queue
        SET status = 'failed',
            error_message = ?,
            updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(reason)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Put a failed item back in line, counting the retry.
pub async fn reset_for_retry(
    pool: &SqlitePool,
    id: i64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE auto_publish_queue
        SET status = 'pending',
            error_message = NULL,
            retry_count = retry_count + 1,
            updated_at = ?
        WHERE id = ? AND status = 'failed'
        "#,
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM auto_publish_queue WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn stats(pool: &SqlitePool, now: DateTime<Utc>) -> Result<AutoPublishStats, sqlx::Error> {
    let (total, pending, processed, failed, ready_to_publish) =
        sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'processed' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'pending' AND publish_date <= ? THEN 1 ELSE 0 END), 0)
            FROM auto_publish_queue
            "#,
        )
        .bind(now)
        .fetch_one(pool)
        .await?;

    Ok(AutoPublishStats {
        total,
        pending,
        processed,
        failed,
        ready_to_publish,
    })
}

/// Queue statuses of every platform job fanned out from an item.
pub async fn child_statuses(pool: &SqlitePool, id: i64) -> Result<Vec<QueueStatus>, sqlx::Error> {
    sqlx::query_scalar::<_, QueueStatus>(
        r#"
        SELECT q.status
        FROM publish_queue q
        JOIN scheduled_posts p ON p.id = q.scheduled_post_id
        WHERE p.auto_publish_id = ?
        ORDER BY q.id ASC
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await
}
