use chrono::{DateTime, Utc};
use serde_json::Value;
use smo_core::settings::{AutoPublishSettings, AUTO_PUBLISH_SETTINGS_KEY};
use smo_db::queries::settings;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::PublishError;

/// Read the stored policy. A missing or unreadable record yields the defaults.
pub async fn load(pool: &SqlitePool) -> Result<AutoPublishSettings, sqlx::Error> {
    let raw = settings::get(pool, AUTO_PUBLISH_SETTINGS_KEY).await?;
    let (parsed, err) = AutoPublishSettings::from_stored(raw.as_deref());
    if let Some(err) = err {
        warn!(error = %err, "stored auto-publish settings unreadable, using defaults");
    }
    Ok(parsed)
}

/// Merge `patch` into the stored policy and persist it if the result is valid.
pub async fn update(
    pool: &SqlitePool,
    patch: &Value,
    now: DateTime<Utc>,
) -> Result<AutoPublishSettings, PublishError> {
    let current = load(pool).await?;
    let merged = current.merged_with(patch)?;

    let value = serde_json::to_string(&merged).map_err(smo_core::settings::SettingsError::from)?;
    settings::put(pool, AUTO_PUBLISH_SETTINGS_KEY, &value, now).await?;

    info!(
        enabled = merged.enabled,
        platforms = merged.platforms.len(),
        delay_minutes = merged.delay_minutes,
        "auto-publish settings updated"
    );
    Ok(merged)
}
