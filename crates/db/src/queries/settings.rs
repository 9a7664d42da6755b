use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Raw JSON stored under a settings name, if any.
pub async fn get(pool: &SqlitePool, name: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub async fn put(
    pool: &SqlitePool,
    name: &str,
    value: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO settings (name, value, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT (name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(name)
    .bind(value)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}
