//! Hand-off of a claimed publish job to the platform integration layer.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smo_core::auth::sign_payload;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchJob {
    pub delivery_id: String,
    pub queue_id: i64,
    pub scheduled_post_id: i64,
    pub platform: String,
    pub title: String,
    pub content: String,
    pub media_ids: Vec<i64>,
    pub scheduled_time: DateTime<Utc>,
    pub attempt: i32,
}

impl DispatchJob {
    pub fn new_delivery_id() -> String {
        format!("dlv_{}", nanoid::nanoid!(12))
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("failed to encode payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Something that can publish one job to one platform.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: &DispatchJob) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Posts each job as signed JSON to a single integration endpoint.
#[derive(Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
    secret: String,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, url, secret))
    }

    pub fn with_client(
        client: reqwest::Client,
        url: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            secret: secret.into(),
        }
    }
}

impl Dispatcher for WebhookDispatcher {
    async fn dispatch(&self, job: &DispatchJob) -> Result<(), DispatchError> {
        let body = serde_json::to_string(job)?;
        let timestamp = Utc::now().timestamp();
        let signature = sign_payload(&self.secret, timestamp, &body);

        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Smo-Signature", signature)
            .header("X-Smo-Timestamp", timestamp.to_string())
            .header("X-Smo-Delivery-Id", job.delivery_id.clone())
            .body(body)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(DispatchError::Status(resp.status().as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_id_prefix() {
        let id = DispatchJob::new_delivery_id();
        assert!(id.starts_with("dlv_"));
        assert_eq!(id.len(), 16);
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = DispatchJob {
            delivery_id: "dlv_test".into(),
            queue_id: 7,
            scheduled_post_id: 3,
            platform: "twitter".into(),
            title: "Hello".into(),
            content: "Body".into(),
            media_ids: vec![42],
            scheduled_time: Utc::now(),
            attempt: 1,
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["deliveryId"], "dlv_test");
        assert_eq!(value["queueId"], 7);
        assert_eq!(value["mediaIds"][0], 42);
    }

    #[test]
    fn test_status_error_message() {
        assert_eq!(DispatchError::Status(502).to_string(), "HTTP 502");
    }
}
