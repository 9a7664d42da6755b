mod common;

use chrono::Duration;
use common::*;
use smo_autopublish::delivery::{drain_publish_queue, DeliveryOptions};
use smo_core::types::{QueueStatus, ScheduledPostStatus, TriggerReason};
use smo_db::queries::{publish_queue, scheduled_posts};

#[tokio::test]
async fn test_drain_completes_jobs_and_publishes_posts() {
    let pool = setup_pool().await;
    let manager = manager(&pool, &["twitter", "linkedin"], 0);
    let now = base_time();

    let mut item = content(31, "<p>Hello world</p>");
    item.featured_media_id = Some(5);
    assert!(manager.enqueue(&item, TriggerReason::New, now).await);

    let dispatcher = FakeDispatcher::default();
    let report = drain_publish_queue(&pool, &dispatcher, DeliveryOptions::default(), now)
        .await
        .unwrap();
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 0);

    let sent = dispatcher.sent();
    assert_eq!(sent.len(), 2);
    for job in &sent {
        assert!(job.delivery_id.starts_with("dlv_"));
        assert_eq!(job.attempt, 1);
        assert_eq!(job.media_ids, vec![5]);
        assert_eq!(job.content, "Hello world\n\nhttps://example.com/?p=31");

        let queued = publish_queue::get_by_id(&pool, job.queue_id).await.unwrap().unwrap();
        assert_eq!(queued.status, QueueStatus::Completed);
        assert!(queued.completed_at.is_some());
        assert!(queued.lease_expires_at.is_none());

        let post = scheduled_posts::get_by_id(&pool, job.scheduled_post_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.status, ScheduledPostStatus::Published);
    }

    let again = drain_publish_queue(&pool, &dispatcher, DeliveryOptions::default(), now)
        .await
        .unwrap();
    assert_eq!(again.completed, 0);
    assert_eq!(dispatcher.sent().len(), 2);
}

#[tokio::test]
async fn test_failed_attempt_is_retried_after_delay() {
    let pool = setup_pool().await;
    let manager = manager(&pool, &["twitter"], 0);
    let now = base_time();
    assert!(manager.enqueue(&content(32, "retry me"), TriggerReason::New, now).await);

    let dispatcher = FakeDispatcher::failing(1);
    let report = drain_publish_queue(&pool, &dispatcher, DeliveryOptions::default(), now)
        .await
        .unwrap();
    assert_eq!(report.retried, 1);

    let job_id = dispatcher.sent()[0].queue_id;
    let parked = publish_queue::get_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(parked.status, QueueStatus::Retry);
    assert_eq!(parked.attempts, 1);
    assert_eq!(parked.scheduled_for, now + Duration::seconds(60));
    assert_eq!(parked.error_message.as_deref(), Some("HTTP 503"));

    let early = drain_publish_queue(&pool, &dispatcher, DeliveryOptions::default(), now + Duration::seconds(59))
        .await
        .unwrap();
    assert_eq!(early, Default::default());

    let later = now + Duration::seconds(60);
    let report = drain_publish_queue(&pool, &dispatcher, DeliveryOptions::default(), later)
        .await
        .unwrap();
    assert_eq!(report.completed, 1);

    let done = publish_queue::get_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(done.status, QueueStatus::Completed);
    assert_eq!(done.attempts, 2);
    assert_eq!(dispatcher.sent()[1].attempt, 2);
}

#[tokio::test]
async fn test_job_fails_permanently_after_max_attempts() {
    let pool = setup_pool().await;
    let manager = manager(&pool, &["facebook"], 0);
    let now = base_time();
    assert!(manager.enqueue(&content(33, "never works"), TriggerReason::New, now).await);

    let dispatcher = FakeDispatcher::failing(usize::MAX);
    let mut at = now;
    for _ in 0..2 {
        let report = drain_publish_queue(&pool, &dispatcher, DeliveryOptions::default(), at)
            .await
            .unwrap();
        assert_eq!(report.retried, 1);
        at += Duration::hours(1);
    }
    let report = drain_publish_queue(&pool, &dispatcher, DeliveryOptions::default(), at)
        .await
        .unwrap();
    assert_eq!(report.failed, 1);

    let job_id = dispatcher.sent()[0].queue_id;
    let failed = publish_queue::get_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(failed.status, QueueStatus::Failed);
    assert_eq!(failed.attempts, failed.max_attempts);
    assert_eq!(failed.completed_at, Some(at));

    let post = scheduled_posts::get_by_id(&pool, failed.scheduled_post_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post.status, ScheduledPostStatus::Failed);
}

#[tokio::test]
async fn test_leased_jobs_are_skipped() {
    let pool = setup_pool().await;
    let manager = manager(&pool, &["twitter"], 0);
    let now = base_time();
    assert!(manager.enqueue(&content(34, "busy"), TriggerReason::New, now).await);

    let job = publish_queue::get_next_item(&pool, now).await.unwrap().unwrap();
    assert!(publish_queue::lock_and_process(&pool, job.id, now, 300).await.unwrap());

    let dispatcher = FakeDispatcher::default();
    let report = drain_publish_queue(&pool, &dispatcher, DeliveryOptions::default(), now)
        .await
        .unwrap();
    assert_eq!(report, Default::default());
    assert!(dispatcher.sent().is_empty());
}

#[tokio::test]
async fn test_expired_lease_is_reclaimed_and_delivered() {
    let pool = setup_pool().await;
    let manager = manager(&pool, &["twitter"], 0);
    let now = base_time();
    assert!(manager.enqueue(&content(36, "orphaned"), TriggerReason::New, now).await);

    // Claimed by a worker that never reported back.
    let job = publish_queue::get_next_item(&pool, now).await.unwrap().unwrap();
    assert!(publish_queue::lock_and_process(&pool, job.id, now, 300).await.unwrap());

    let dispatcher = FakeDispatcher::default();
    let still_leased = now + Duration::seconds(299);
    let report = drain_publish_queue(&pool, &dispatcher, DeliveryOptions::default(), still_leased)
        .await
        .unwrap();
    assert_eq!(report, Default::default());

    let expired = now + Duration::hours(1);
    let report = drain_publish_queue(&pool, &dispatcher, DeliveryOptions::default(), expired)
        .await
        .unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(dispatcher.sent().len(), 1);

    let done = publish_queue::get_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(done.status, QueueStatus::Completed);
    assert!(done.lease_expires_at.is_none());
}

#[tokio::test]
async fn test_non_positive_batch_size_still_drains_one_job() {
    let pool = setup_pool().await;
    let manager = manager(&pool, &["twitter", "linkedin"], 0);
    let now = base_time();
    assert!(manager.enqueue(&content(37, "tiny batch"), TriggerReason::New, now).await);

    let dispatcher = FakeDispatcher::default();
    let options = DeliveryOptions {
        batch_size: -5,
        ..DeliveryOptions::default()
    };
    let report = drain_publish_queue(&pool, &dispatcher, options, now).await.unwrap();
    assert_eq!(report.completed, 1);
}

#[tokio::test]
async fn test_batch_size_bounds_one_pass() {
    let pool = setup_pool().await;
    let manager = manager(&pool, &["twitter", "linkedin", "facebook"], 0);
    let now = base_time();
    assert!(manager.enqueue(&content(35, "many"), TriggerReason::New, now).await);

    let dispatcher = FakeDispatcher::default();
    let options = DeliveryOptions {
        batch_size: 2,
        ..DeliveryOptions::default()
    };
    let report = drain_publish_queue(&pool, &dispatcher, options, now).await.unwrap();
    assert_eq!(report.completed, 2);

    let stats = publish_queue::get_queue_stats(&pool).await.unwrap();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.pending, 1);
}
