use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a row in the publish queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Retry,
    Cancelled,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 6] = [
        QueueStatus::Pending,
        QueueStatus::Processing,
        QueueStatus::Completed,
        QueueStatus::Failed,
        QueueStatus::Retry,
        QueueStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
            QueueStatus::Retry => "retry",
            QueueStatus::Cancelled => "cancelled",
        }
    }

    /// No further processing will happen without an administrative action.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueStatus::Completed | QueueStatus::Failed | QueueStatus::Cancelled
        )
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown queue status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for QueueStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Status of a parent auto-publish item.
///
/// `Processed` means the per-platform fan-out has been written; how those
/// children fared is reported separately by [`ItemOutcome`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum AutoPublishStatus {
    Pending,
    Processed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ScheduledPostStatus {
    Scheduled,
    Published,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum TriggerReason {
    New,
    Updated,
}

/// Job priority. Stored as its rank so the database can order by it.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Urgent = 3,
}

/// Publication state of a content item in the host CMS.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[serde(alias = "publish")]
    Published,
    Draft,
    Pending,
    Private,
    Future,
    Trash,
}

/// Snapshot of a content item as delivered by the host CMS hooks.
///
/// `body`, `title` and `excerpt` may still contain markup; rendering strips it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: i64,
    pub author_id: i64,
    #[serde(default = "default_site_id")]
    pub site_id: i64,
    pub post_type: String,
    pub status: ContentStatus,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub excerpt: String,
    pub permalink: String,
    #[serde(default)]
    pub featured_media_id: Option<i64>,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_site_id() -> i64 {
    1
}

/// Aggregate outcome of an auto-publish item, derived from its children.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Not yet fanned out.
    Pending,
    InFlight,
    Completed,
    PartiallyFailed,
    Failed,
    Cancelled,
}

impl ItemOutcome {
    /// Derive a parent outcome from the queue statuses of its platform jobs.
    pub fn derive(children: &[QueueStatus]) -> Self {
        if children.is_empty() {
            return ItemOutcome::Pending;
        }
        if children.iter().any(|status| !status.is_terminal()) {
            return ItemOutcome::InFlight;
        }

        let completed = children
            .iter()
            .filter(|s| **s == QueueStatus::Completed)
            .count();
        let failed = children
            .iter()
            .filter(|s| **s == QueueStatus::Failed)
            .count();

        match (completed, failed) {
            (0, 0) => ItemOutcome::Cancelled,
            (_, 0) => ItemOutcome::Completed,
            (0, _) => ItemOutcome::Failed,
            _ => ItemOutcome::PartiallyFailed,
        }
    }
}

/// Counters over the auto-publish queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AutoPublishStats {
    pub total: i64,
    pub pending: i64,
    pub processed: i64,
    pub failed: i64,
    pub ready_to_publish: i64,
}

/// Per-status counters over the publish queue; every bucket is always present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub retry: i64,
    pub cancelled: i64,
}

impl QueueStats {
    pub fn add(&mut self, status: QueueStatus, count: i64) {
        match status {
            QueueStatus::Pending => self.pending += count,
            QueueStatus::Processing => self.processing += count,
            QueueStatus::Completed => self.completed += count,
            QueueStatus::Failed => self.failed += count,
            QueueStatus::Retry => self.retry += count,
            QueueStatus::Cancelled => self.cancelled += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.failed + self.retry + self.cancelled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    pub total_items: i64,
    pub oldest_pending_minutes: Option<i64>,
    pub failed_items: i64,
    /// Mean seconds between enqueue and completion over the last day.
    pub avg_processing_time: Option<f64>,
    pub measured_at: DateTime<Utc>,
}
