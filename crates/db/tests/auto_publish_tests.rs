mod common;

use chrono::{DateTime, Duration, Utc};
use common::{base_time, setup_pool};
use smo_db::models::{AutoPublishStatus, NewAutoPublishItem, Priority, TriggerReason};
use smo_db::queries::auto_publish;
use sqlx::SqlitePool;

fn new_item(post_id: i64, publish_date: DateTime<Utc>) -> NewAutoPublishItem {
    NewAutoPublishItem {
        post_id,
        user_id: 2,
        site_id: 1,
        trigger_reason: TriggerReason::New,
        title: "Hello".to_string(),
        content: "Body\n\nhttps://example.com/hello".to_string(),
        excerpt: String::new(),
        featured_image_id: Some(9),
        categories: "3,4".to_string(),
        tags: "rust,queues".to_string(),
        publish_date,
        platforms: "twitter,linkedin".to_string(),
        auto_hashtags: true,
        auto_optimize: false,
        custom_message: String::new(),
        priority: Priority::Normal,
    }
}

async fn insert(pool: &SqlitePool, item: NewAutoPublishItem, now: DateTime<Utc>) -> i64 {
    auto_publish::insert(pool, &item, now).await.unwrap().id
}

#[tokio::test]
async fn test_insert_round_trips_fields() {
    let pool = setup_pool().await;
    let now = base_time();

    let item = auto_publish::insert(&pool, &new_item(42, now), now).await.unwrap();
    assert_eq!(item.post_id, 42);
    assert_eq!(item.status, AutoPublishStatus::Pending);
    assert_eq!(item.trigger_reason, TriggerReason::New);
    assert_eq!(item.platform_list(), vec!["twitter", "linkedin"]);
    assert_eq!(item.category_ids(), vec![3, 4]);
    assert_eq!(item.tag_list(), vec!["rust", "queues"]);
    assert_eq!(item.featured_image_id, Some(9));
    assert!(item.auto_hashtags);
    assert!(!item.auto_optimize);
    assert_eq!(item.retry_count, 0);
    assert!(item.actual_publish_date.is_none());

    let fetched = auto_publish::get_by_id(&pool, item.id).await.unwrap().unwrap();
    assert_eq!(fetched.publish_date, now);
}

#[tokio::test]
async fn test_has_pending_for_post() {
    let pool = setup_pool().await;
    let now = base_time();
    assert!(!auto_publish::has_pending_for_post(&pool, 42).await.unwrap());

    let id = insert(&pool, new_item(42, now), now).await;
    assert!(auto_publish::has_pending_for_post(&pool, 42).await.unwrap());
    assert!(!auto_publish::has_pending_for_post(&pool, 43).await.unwrap());

    assert!(auto_publish::claim_for_processing(&pool, id, now).await.unwrap());
    assert!(!auto_publish::has_pending_for_post(&pool, 42).await.unwrap());
}

#[tokio::test]
async fn test_list_due_orders_and_filters() {
    let pool = setup_pool().await;
    let now = base_time();

    let older = insert(&pool, new_item(1, now - Duration::minutes(20)), now).await;
    let newer = insert(&pool, new_item(2, now - Duration::minutes(10)), now).await;
    let mut urgent = new_item(3, now - Duration::minutes(1));
    urgent.priority = Priority::Urgent;
    let urgent = insert(&pool, urgent, now).await;
    insert(&pool, new_item(4, now + Duration::minutes(30)), now).await;

    let due = auto_publish::list_due(&pool, now, 10).await.unwrap();
    let ids: Vec<i64> = due.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![urgent, older, newer]);

    assert_eq!(auto_publish::list_due(&pool, now, 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_claim_succeeds_once() {
    let pool = setup_pool().await;
    let now = base_time();
    let id = insert(&pool, new_item(1, now), now).await;

    assert!(auto_publish::claim_for_processing(&pool, id, now).await.unwrap());
    assert!(!auto_publish::claim_for_processing(&pool, id, now).await.unwrap());

    let item = auto_publish::get_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(item.status, AutoPublishStatus::Processed);
    assert_eq!(item.actual_publish_date, Some(now));
}

#[tokio::test]
async fn test_reset_for_retry_counts_and_clears_error() {
    let pool = setup_pool().await;
    let now = base_time();
    let id = insert(&pool, new_item(1, now), now).await;

    assert!(!auto_publish::reset_for_retry(&pool, id, now).await.unwrap());

    auto_publish::mark_failed(&pool, id, "disk full", now).await.unwrap();
    assert!(auto_publish::reset_for_retry(&pool, id, now).await.unwrap());
    auto_publish::mark_failed(&pool, id, "disk full again", now).await.unwrap();
    assert!(auto_publish::reset_for_retry(&pool, id, now).await.unwrap());

    let item = auto_publish::get_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(item.status, AutoPublishStatus::Pending);
    assert!(item.error_message.is_none());
    assert_eq!(item.retry_count, 2);
}

#[tokio::test]
async fn test_stats() {
    let pool = setup_pool().await;
    let now = base_time();

    insert(&pool, new_item(1, now - Duration::minutes(5)), now).await;
    insert(&pool, new_item(2, now + Duration::minutes(5)), now).await;
    let processed = insert(&pool, new_item(3, now), now).await;
    auto_publish::claim_for_processing(&pool, processed, now).await.unwrap();
    let failed = insert(&pool, new_item(4, now), now).await;
    auto_publish::mark_failed(&pool, failed, "x", now).await.unwrap();

    let stats = auto_publish::stats(&pool, now).await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.ready_to_publish, 1);
}

#[tokio::test]
async fn test_withdraw_pending_keeps_row() {
    let pool = setup_pool().await;
    let now = base_time();
    let id = insert(&pool, new_item(1, now), now).await;

    assert!(auto_publish::withdraw_pending(&pool, id, "content unpublished", now).await.unwrap());
    assert!(!auto_publish::withdraw_pending(&pool, id, "content unpublished", now).await.unwrap());

    let stored = auto_publish::get_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(stored.status, AutoPublishStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some("content unpublished"));
}

#[tokio::test]
async fn test_delete() {
    let pool = setup_pool().await;
    let now = base_time();
    let id = insert(&pool, new_item(1, now), now).await;

    assert!(auto_publish::delete(&pool, id).await.unwrap());
    assert!(!auto_publish::delete(&pool, id).await.unwrap());
    assert!(auto_publish::get_by_id(&pool, id).await.unwrap().is_none());
}
