//! Typed auto-publish policy.
//!
//! The policy is stored as one JSON record. It is parsed once at the
//! boundary: a missing or malformed record yields the defaults, and updates
//! are validated before they are accepted, so downstream code never has to
//! second-guess the shape of the data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Name of the settings record holding the auto-publish policy.
pub const AUTO_PUBLISH_SETTINGS_KEY: &str = "auto_publish";

pub const MAX_DELAY_MINUTES: u32 = 1440;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoPublishSettings {
    pub enabled: bool,
    pub platforms: Vec<String>,
    pub post_types: Vec<String>,
    pub categories: Vec<i64>,
    pub delay_minutes: u32,
    pub require_featured_image: bool,
    pub auto_hashtags: bool,
    pub auto_optimize: bool,
    pub custom_message: String,
}

impl Default for AutoPublishSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            platforms: Vec::new(),
            post_types: Vec::new(),
            categories: Vec::new(),
            delay_minutes: 0,
            require_featured_image: false,
            auto_hashtags: true,
            auto_optimize: true,
            custom_message: String::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings patch must be a JSON object")]
    NotAnObject,
    #[error("invalid settings: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("settings rejected: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl AutoPublishSettings {
    /// Parse a stored record, falling back to defaults when it cannot be read.
    ///
    /// Returns the parse error alongside the defaults so callers can log it.
    pub fn from_stored(raw: Option<&str>) -> (Self, Option<serde_json::Error>) {
        match raw {
            None => (Self::default(), None),
            Some(raw) => match serde_json::from_str(raw) {
                Ok(settings) => (settings, None),
                Err(err) => (Self::default(), Some(err)),
            },
        }
    }

    /// Check the policy; every problem is reported, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.platforms.iter().all(|p| p.trim().is_empty()) {
            errors.push("at least one platform must be selected".to_string());
        }
        if self.delay_minutes > MAX_DELAY_MINUTES {
            errors.push(format!(
                "delay must be between 0 and {} minutes",
                MAX_DELAY_MINUTES
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merge a partial JSON object over these settings and validate the result.
    pub fn merged_with(&self, patch: &Value) -> Result<Self, SettingsError> {
        let patch = patch.as_object().ok_or(SettingsError::NotAnObject)?;

        let mut current = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut current {
            for (key, value) in patch {
                fields.insert(key.clone(), value.clone());
            }
        }

        let merged: Self = serde_json::from_value(current)?;
        merged.validate().map_err(SettingsError::Invalid)?;
        Ok(merged.normalized())
    }

    fn normalized(mut self) -> Self {
        self.platforms = self
            .platforms
            .into_iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        let mut seen = HashSet::new();
        self.platforms.retain(|p| seen.insert(p.clone()));
        self.post_types = self
            .post_types
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }
}
