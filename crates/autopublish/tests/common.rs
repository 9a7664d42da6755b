#![allow(dead_code)]

use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use smo_autopublish::dispatch::{DispatchError, DispatchJob, Dispatcher};
use smo_autopublish::AutoPublishManager;
use smo_core::settings::AutoPublishSettings;
use smo_core::types::{ContentItem, ContentStatus};
use sqlx::SqlitePool;

pub async fn setup_pool() -> SqlitePool {
    smo_db::connect("sqlite::memory:", 1)
        .await
        .expect("in-memory database")
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
}

pub fn settings(platforms: &[&str], delay_minutes: u32) -> AutoPublishSettings {
    AutoPublishSettings {
        enabled: true,
        platforms: platforms.iter().map(|p| p.to_string()).collect(),
        delay_minutes,
        ..AutoPublishSettings::default()
    }
}

pub fn manager(pool: &SqlitePool, platforms: &[&str], delay_minutes: u32) -> AutoPublishManager {
    AutoPublishManager::new(pool.clone(), settings(platforms, delay_minutes))
}

pub fn content(id: i64, body: &str) -> ContentItem {
    ContentItem {
        id,
        author_id: 9,
        site_id: 1,
        post_type: "post".into(),
        status: ContentStatus::Published,
        title: "Launch day".into(),
        body: body.into(),
        excerpt: String::new(),
        permalink: format!("https://example.com/?p={id}"),
        featured_media_id: None,
        category_ids: vec![],
        tags: vec![],
    }
}

/// Records every job and fails the first `failures` calls.
#[derive(Default)]
pub struct FakeDispatcher {
    pub jobs: Mutex<Vec<DispatchJob>>,
    failures: Mutex<usize>,
}

impl FakeDispatcher {
    pub fn failing(failures: usize) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            failures: Mutex::new(failures),
        }
    }

    pub fn sent(&self) -> Vec<DispatchJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl Dispatcher for FakeDispatcher {
    async fn dispatch(&self, job: &DispatchJob) -> Result<(), DispatchError> {
        self.jobs.lock().unwrap().push(job.clone());
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(DispatchError::Status(503));
        }
        Ok(())
    }
}
