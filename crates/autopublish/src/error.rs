use smo_core::settings::SettingsError;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("auto-publish item {0} has no platforms")]
    NoPlatforms(i64),
}
