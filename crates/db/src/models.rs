use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub use smo_core::types::{
    AutoPublishStatus, Priority, QueueStatus, ScheduledPostStatus, TriggerReason,
};

use crate::split_list;

/// A content item waiting to be fanned out into per-platform jobs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AutoPublishItem {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub site_id: i64,
    pub trigger_reason: TriggerReason,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image_id: Option<i64>,
    pub categories: String,
    pub tags: String,
    pub publish_date: DateTime<Utc>,
    pub platforms: String,
    pub auto_hashtags: bool,
    pub auto_optimize: bool,
    pub custom_message: String,
    pub priority: Priority,
    pub status: AutoPublishStatus,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub actual_publish_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AutoPublishItem {
    pub fn platform_list(&self) -> Vec<String> {
        split_list(&self.platforms)
    }

    pub fn category_ids(&self) -> Vec<i64> {
        split_list(&self.categories)
            .iter()
            .filter_map(|id| id.parse().ok())
            .collect()
    }

    pub fn tag_list(&self) -> Vec<String> {
        split_list(&self.tags)
    }
}

/// Values for a new auto-publish item; list fields are already joined.
#[derive(Debug, Clone)]
pub struct NewAutoPublishItem {
    pub post_id: i64,
    pub user_id: i64,
    pub site_id: i64,
    pub trigger_reason: TriggerReason,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image_id: Option<i64>,
    pub categories: String,
    pub tags: String,
    pub publish_date: DateTime<Utc>,
    pub platforms: String,
    pub auto_hashtags: bool,
    pub auto_optimize: bool,
    pub custom_message: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPost {
    pub id: i64,
    pub auto_publish_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: ScheduledPostStatus,
    pub created_by: i64,
    pub post_type: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewScheduledPost<'a> {
    pub auto_publish_id: Option<i64>,
    pub title: &'a str,
    pub content: &'a str,
    pub scheduled_time: DateTime<Utc>,
    pub created_by: i64,
    pub priority: Priority,
}

/// A per-platform publish job.
///
/// `lease_expires_at` is only meaningful while the job is `processing`;
/// `completed_at` records when it finished as completed or failed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: i64,
    pub scheduled_post_id: i64,
    pub platform_slug: String,
    pub priority: Priority,
    pub scheduled_for: DateTime<Utc>,
    pub status: QueueStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error_message: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A publish job joined with its scheduled post, for display.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemWithPost {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: QueueItem,
    pub title: String,
    pub content: String,
    pub scheduled_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStat {
    pub day: String,
    pub total_items: i64,
    pub avg_processing_time_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStat {
    pub platform_slug: String,
    pub status: QueueStatus,
    pub count: i64,
}
