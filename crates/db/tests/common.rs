#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use smo_db::models::{NewScheduledPost, Priority};
use smo_db::queries::scheduled_posts;
use sqlx::SqlitePool;

pub async fn setup_pool() -> SqlitePool {
    smo_db::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory database")
}

/// A file-backed pool with several connections, for tests that need real
/// contention. Keep the returned directory alive for the pool's lifetime.
pub async fn setup_file_pool(max_connections: u32) -> (SqlitePool, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("queue.db").display());
    let pool = smo_db::connect(&url, max_connections)
        .await
        .expect("file database");
    (pool, dir)
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
}

pub async fn seed_post(pool: &SqlitePool, title: &str, now: DateTime<Utc>) -> i64 {
    scheduled_posts::insert(
        pool,
        &NewScheduledPost {
            auto_publish_id: None,
            title,
            content: "content",
            scheduled_time: now,
            created_by: 1,
            priority: Priority::Normal,
        },
        now,
    )
    .await
    .expect("seed scheduled post")
}
