//! Scheduled post records written during fan-out.
//!
//! Each auto-publish item produces one scheduled post per platform, with a
//! platform association row and, when the content has a featured image, a
//! media association row.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::{NewScheduledPost, ScheduledPost, ScheduledPostStatus};

pub async fn insert<'e, E>(
    executor: E,
    post: &NewScheduledPost<'_>,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO scheduled_posts
            (auto_publish_id, title, content, scheduled_time, status,
             created_by, post_type, priority, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'scheduled', ?, 'auto_publish', ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(post.auto_publish_id)
    .bind(post.title)
    .bind(post.content)
    .bind(post.scheduled_time)
    .bind(post.created_by)
    .bind(post.priority)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub async fn link_platform<'e, E>(
    executor: E,
    scheduled_post_id: i64,
    platform_slug: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO scheduled_post_platforms (scheduled_post_id, platform_slug)
        VALUES (?, ?)
        "#,
    )
    .bind(scheduled_post_id)
    .bind(platform_slug)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn link_media<'e, E>(
    executor: E,
    scheduled_post_id: i64,
    media_id: i64,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO scheduled_post_media (scheduled_post_id, media_id)
        VALUES (?, ?)
        "#,
    )
    .bind(scheduled_post_id)
    .bind(media_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<ScheduledPost>, sqlx::Error> {
    sqlx::query_as::<_, ScheduledPost>(
        r#"
        SELECT id, auto_publish_id, title, content, scheduled_time, status,
               created_by, post_type, priority, created_at, updated_at
        FROM scheduled_posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Scheduled posts fanned out from an auto-publish item, in creation order.
pub async fn list_by_parent(
    pool: &SqlitePool,
    auto_publish_id: i64,
) -> Result<Vec<ScheduledPost>, sqlx::Error> {
    sqlx::query_as::<_, ScheduledPost>(
        r#"
        SELECT id, auto_publish_id, title, content, scheduled_time, status,
               created_by, post_type, priority, created_at, updated_at
        FROM scheduled_posts
        WHERE auto_publish_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(auto_publish_id)
    .fetch_all(pool)
    .await
}

pub async fn platforms_for(pool: &SqlitePool, scheduled_post_id: i64) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT platform_slug
        FROM scheduled_post_platforms
        WHERE scheduled_post_id = ?
        ORDER BY platform_slug
        "#,
    )
    .bind(scheduled_post_id)
    .fetch_all(pool)
    .await
}

pub async fn media_for(pool: &SqlitePool, scheduled_post_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT media_id
        FROM scheduled_post_media
        WHERE scheduled_post_id = ?
        ORDER BY media_id
        "#,
    )
    .bind(scheduled_post_id)
    .fetch_all(pool)
    .await
}

pub async fn update_status<'e, E>(
    executor: E,
    id: i64,
    status: ScheduledPostStatus,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE scheduled_posts
        SET status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}
