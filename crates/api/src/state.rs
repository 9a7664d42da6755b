use std::sync::Arc;

use smo_autopublish::AutoPublishManager;
use smo_core::config::Settings;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Settings>,
}

impl AppState {
    /// A manager bound to the policy as it is stored right now.
    pub async fn manager(&self) -> Result<AutoPublishManager, sqlx::Error> {
        Ok(AutoPublishManager::load(self.db.clone())
            .await?
            .with_batch_size(self.config.drain_batch_size))
    }
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);
