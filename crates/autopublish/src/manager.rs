//! Eligibility gate and queue producer.
//!
//! Content lifecycle hooks land here. Qualifying content becomes one
//! auto-publish item; once that item is due, a drain fans it out into one
//! scheduled post and one publish-queue job per configured platform.

use chrono::{DateTime, Duration, Utc};
use smo_core::content::{optimize_for_platform, render};
use smo_core::eligibility;
use smo_core::settings::AutoPublishSettings;
use smo_core::types::{
    AutoPublishStats, AutoPublishStatus, ContentItem, ContentStatus, ItemOutcome, Priority, ScheduledPostStatus,
    TriggerReason,
};
use smo_db::models::{AutoPublishItem, NewAutoPublishItem, NewScheduledPost};
use smo_db::queries::publish_queue::NewQueueItem;
use smo_db::queries::{auto_publish, publish_queue, scheduled_posts};
use smo_db::join_list;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::PublishError;

/// Items fanned out per drain pass.
pub const DEFAULT_DRAIN_BATCH: i64 = 10;

/// Error recorded on pending items withdrawn because their content was unpublished.
pub const CONTENT_UNPUBLISHED: &str = "content unpublished";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub materialized: usize,
    /// Claimed by a concurrent drain before this one got to them.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct AutoPublishManager {
    pool: SqlitePool,
    settings: AutoPublishSettings,
    batch_size: i64,
}

impl AutoPublishManager {
    pub fn new(pool: SqlitePool, settings: AutoPublishSettings) -> Self {
        Self {
            pool,
            settings,
            batch_size: DEFAULT_DRAIN_BATCH,
        }
    }

    /// Build a manager with the policy currently stored in the database.
    pub async fn load(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        let settings = crate::settings::load(&pool).await?;
        Ok(Self::new(pool, settings))
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn settings(&self) -> &AutoPublishSettings {
        &self.settings
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Hook for content that has just been published.
    ///
    /// Saves that merely update already-published content are ignored here;
    /// they arrive through [`Self::on_content_updated`]. Errors are logged.
    pub async fn on_content_published(&self, content: &ContentItem, is_update: bool) {
        if is_update || content.status != ContentStatus::Published {
            debug!(content_id = content.id, is_update, "not a new publish, skipping");
            return;
        }
        self.enqueue_unless_pending(content, TriggerReason::New, Utc::now())
            .await;
    }

    /// Hook for an edit to content that was and still is published.
    pub async fn on_content_updated(&self, content: &ContentItem, previous_status: ContentStatus) {
        if previous_status != ContentStatus::Published || content.status != ContentStatus::Published
        {
            debug!(content_id = content.id, "update is not published-to-published, skipping");
            return;
        }
        self.enqueue_unless_pending(content, TriggerReason::Updated, Utc::now())
            .await;
    }

    /// Hook for content leaving the published state; cancels its open jobs.
    pub async fn on_content_unpublished(&self, content_id: i64) {
        match self.cancel_content(content_id, Utc::now()).await {
            Ok(0) => {}
            Ok(cancelled) => info!(content_id, cancelled, "cancelled queued jobs for content"),
            Err(err) => error!(content_id, error = %err, "failed to cancel queued jobs"),
        }
    }

    async fn enqueue_unless_pending(
        &self,
        content: &ContentItem,
        reason: TriggerReason,
        now: DateTime<Utc>,
    ) {
        if !self.is_eligible(content) {
            return;
        }
        match auto_publish::has_pending_for_post(&self.pool, content.id).await {
            Ok(true) => {
                debug!(content_id = content.id, "pending item already queued, skipping");
            }
            Ok(false) => {
                self.enqueue(content, reason, now).await;
            }
            Err(err) => {
                error!(content_id = content.id, error = %err, "failed to check for pending item");
            }
        }
    }

    pub fn is_eligible(&self, content: &ContentItem) -> bool {
        match eligibility::check(&self.settings, content) {
            Ok(()) => true,
            Err(rejection) => {
                debug!(content_id = content.id, reason = rejection.as_str(), "content not eligible");
                false
            }
        }
    }

    /// Queue a content item; returns false if it could not be stored.
    ///
    /// With no configured delay the item is due immediately, and a drain runs
    /// before this returns.
    pub async fn enqueue(
        &self,
        content: &ContentItem,
        reason: TriggerReason,
        now: DateTime<Utc>,
    ) -> bool {
        let item = match self.try_enqueue(content, reason, now).await {
            Ok(item) => item,
            Err(err) => {
                error!(content_id = content.id, error = %err, "failed to enqueue content");
                return false;
            }
        };

        info!(
            item_id = item.id,
            content_id = content.id,
            publish_date = %item.publish_date,
            platforms = %item.platforms,
            "content queued for auto-publish"
        );

        if self.settings.delay_minutes == 0 {
            if let Err(err) = self.drain_due_items(now).await {
                error!(item_id = item.id, error = %err, "immediate drain failed");
            }
        }
        true
    }

    pub async fn try_enqueue(
        &self,
        content: &ContentItem,
        reason: TriggerReason,
        now: DateTime<Utc>,
    ) -> Result<AutoPublishItem, PublishError> {
        let rendered = render(content, &self.settings);
        let publish_date = now + Duration::minutes(i64::from(self.settings.delay_minutes));

        let new_item = NewAutoPublishItem {
            post_id: content.id,
            user_id: content.author_id,
            site_id: content.site_id,
            trigger_reason: reason,
            title: rendered.title,
            content: rendered.body,
            excerpt: rendered.excerpt,
            featured_image_id: content.featured_media_id,
            categories: join_list(&content.category_ids),
            tags: join_list(&content.tags),
            publish_date,
            platforms: join_list(&self.settings.platforms),
            auto_hashtags: self.settings.auto_hashtags,
            auto_optimize: self.settings.auto_optimize,
            custom_message: self.settings.custom_message.clone(),
            priority: Priority::Normal,
        };

        Ok(auto_publish::insert(&self.pool, &new_item, now).await?)
    }

    /// Fan out the due pending items, most urgent and oldest first.
    pub async fn drain_due_items(&self, now: DateTime<Utc>) -> Result<DrainReport, PublishError> {
        let items = auto_publish::list_due(&self.pool, now, self.batch_size).await?;
        let mut report = DrainReport::default();

        for item in items {
            match self.materialize_platform_jobs(&item, now).await {
                Ok(Some(_)) => report.materialized += 1,
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    error!(item_id = item.id, error = %err, "failed to materialize platform jobs");
                    if let Err(mark_err) =
                        auto_publish::mark_failed(&self.pool, item.id, &err.to_string(), now).await
                    {
                        error!(item_id = item.id, error = %mark_err, "failed to mark item failed");
                    }
                }
            }
        }

        if report != DrainReport::default() {
            info!(
                materialized = report.materialized,
                skipped = report.skipped,
                failed = report.failed,
                "auto-publish drain finished"
            );
        }
        Ok(report)
    }

    /// Write one scheduled post and publish job per platform, all or nothing.
    ///
    /// Returns the new publish-queue ids, or `None` when another drain had
    /// already claimed the item.
    pub async fn materialize_platform_jobs(
        &self,
        item: &AutoPublishItem,
        now: DateTime<Utc>,
    ) -> Result<Option<Vec<i64>>, PublishError> {
        let platforms = item.platform_list();
        if platforms.is_empty() {
            return Err(PublishError::NoPlatforms(item.id));
        }

        let mut tx = self.pool.begin().await?;
        if !auto_publish::claim_for_processing(&mut *tx, item.id, now).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        let mut queue_ids = Vec::with_capacity(platforms.len());
        for platform in &platforms {
            let content = self.optimize_content_for_platform(&item.content, platform);
            let post_id = scheduled_posts::insert(
                &mut *tx,
                &NewScheduledPost {
                    auto_publish_id: Some(item.id),
                    title: &item.title,
                    content: &content,
                    scheduled_time: item.publish_date,
                    created_by: item.user_id,
                    priority: item.priority,
                },
                now,
            )
            .await?;
            scheduled_posts::link_platform(&mut *tx, post_id, platform).await?;
            if let Some(media_id) = item.featured_image_id {
                scheduled_posts::link_media(&mut *tx, post_id, media_id).await?;
            }

            let job = NewQueueItem::new(post_id, platform.as_str(), now)
                .priority(item.priority)
                .scheduled_for(item.publish_date);
            let queued = publish_queue::add_to_queue(&mut *tx, &job, now).await?;
            queue_ids.push(queued.id);
        }

        tx.commit().await?;
        debug!(item_id = item.id, jobs = queue_ids.len(), "platform jobs materialized");
        Ok(Some(queue_ids))
    }

    pub fn optimize_content_for_platform(&self, content: &str, platform: &str) -> String {
        optimize_for_platform(content, platform)
    }

    /// Entry point for the periodic driver.
    pub async fn run_periodic_driver(&self) {
        if let Err(err) = self.drain_due_items(Utc::now()).await {
            error!(error = %err, "periodic auto-publish drain failed");
        }
    }

    pub async fn get_queue_stats(&self, now: DateTime<Utc>) -> Result<AutoPublishStats, PublishError> {
        Ok(auto_publish::stats(&self.pool, now).await?)
    }

    /// Fetch an item with the outcome derived from its platform jobs.
    pub async fn get_item(
        &self,
        id: i64,
    ) -> Result<Option<(AutoPublishItem, ItemOutcome)>, PublishError> {
        let Some(item) = auto_publish::get_by_id(&self.pool, id).await? else {
            return Ok(None);
        };
        let children = auto_publish::child_statuses(&self.pool, id).await?;
        Ok(Some((item, ItemOutcome::derive(&children))))
    }

    /// Delete an item, cancelling any of its jobs that have not finished.
    pub async fn remove_from_queue(&self, id: i64, now: DateTime<Utc>) -> Result<bool, PublishError> {
        let posts = scheduled_posts::list_by_parent(&self.pool, id).await?;

        let mut tx = self.pool.begin().await?;
        for post in &posts {
            let cancelled = publish_queue::cancel_post_queue_items(&mut *tx, post.id, now).await?;
            if cancelled > 0 {
                scheduled_posts::update_status(&mut *tx, post.id, ScheduledPostStatus::Cancelled, now)
                    .await?;
            }
        }
        let removed = auto_publish::delete(&mut *tx, id).await?;
        tx.commit().await?;

        if removed {
            info!(item_id = id, "auto-publish item removed");
        }
        Ok(removed)
    }

    /// Return a failed item to `pending`, clearing its error and counting the retry.
    pub async fn retry_failed_item(&self, id: i64, now: DateTime<Utc>) -> Result<bool, PublishError> {
        let retried = auto_publish::reset_for_retry(&self.pool, id, now).await?;
        if retried {
            info!(item_id = id, "auto-publish item queued for retry");
        } else {
            warn!(item_id = id, "retry requested for item that is not failed");
        }
        Ok(retried)
    }

    /// Cancel the open jobs of one scheduled post.
    pub async fn cancel_scheduled_post(
        &self,
        scheduled_post_id: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, PublishError> {
        let mut tx = self.pool.begin().await?;
        let cancelled =
            publish_queue::cancel_post_queue_items(&mut *tx, scheduled_post_id, now).await?;
        if cancelled > 0 {
            scheduled_posts::update_status(
                &mut *tx,
                scheduled_post_id,
                ScheduledPostStatus::Cancelled,
                now,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(cancelled)
    }

    /// Cancel the open jobs fanned out from every item of a content id.
    ///
    /// Items that have not been fanned out yet are marked failed so they never
    /// materialize; their rows stay for the admin to inspect or remove.
    pub async fn cancel_content(&self, content_id: i64, now: DateTime<Utc>) -> Result<u64, PublishError> {
        let mut cancelled = 0;
        for item in auto_publish::list_by_post(&self.pool, content_id).await? {
            if item.status == AutoPublishStatus::Pending
                && auto_publish::withdraw_pending(&self.pool, item.id, CONTENT_UNPUBLISHED, now).await?
            {
                cancelled += 1;
                continue;
            }
            for post in scheduled_posts::list_by_parent(&self.pool, item.id).await? {
                cancelled += self.cancel_scheduled_post(post.id, now).await?;
            }
        }
        Ok(cancelled)
    }

    pub fn validate_settings(settings: &AutoPublishSettings) -> Result<(), Vec<String>> {
        settings.validate()
    }

    /// Persist a settings patch and switch this manager over to the result.
    pub async fn update_settings(
        &mut self,
        patch: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<&AutoPublishSettings, PublishError> {
        self.settings = crate::settings::update(&self.pool, patch, now).await?;
        Ok(&self.settings)
    }
}
