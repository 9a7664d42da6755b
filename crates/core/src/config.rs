use std::ops::RangeInclusive;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is not a valid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration read from the environment.
///
/// The auto-publish policy itself is stored in the database, see
/// [`crate::settings::AutoPublishSettings`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub smo_env: String,
    pub api_bind: String,
    pub api_token: Option<String>,
    pub dispatch_url: Option<String>,
    pub dispatch_secret: String,
    pub drain_interval: Duration,
    pub drain_batch_size: i64,
    pub lock_timeout: Duration,
    pub retention_days: i64,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("SMO_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .ok_or(ConfigError::Missing("SMO_DATABASE_URL or DATABASE_URL"))?;
        let smo_env = lookup("SMO_ENV").unwrap_or_else(|| "development".to_string());
        let api_bind = lookup("SMO_API_BIND").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let api_token = lookup("SMO_API_TOKEN").filter(|v| !v.is_empty());
        let dispatch_url = lookup("SMO_DISPATCH_URL").filter(|v| !v.is_empty());
        let dispatch_secret = lookup("SMO_DISPATCH_SECRET").unwrap_or_default();

        let drain_interval =
            Duration::from_secs(parse_in(&lookup, "SMO_DRAIN_INTERVAL_SECS", 300, 1..=86_400)?);
        let drain_batch_size = parse_in(&lookup, "SMO_DRAIN_BATCH_SIZE", 10, 1..=1_000)?;
        let lock_timeout =
            Duration::from_secs(parse_in(&lookup, "SMO_LOCK_TIMEOUT_SECS", 300, 1..=86_400)?);
        let retention_days = parse_in(&lookup, "SMO_RETENTION_DAYS", 7, 1..=MAX_DAYS)?;

        Ok(Self {
            database_url,
            smo_env,
            api_bind,
            api_token,
            dispatch_url,
            dispatch_secret,
            drain_interval,
            drain_batch_size,
            lock_timeout,
            retention_days,
        })
    }
}

/// Upper bound for any day window, in config or request parameters.
pub const MAX_DAYS: i64 = 36_500;

fn parse_in<F, T>(
    lookup: &F,
    name: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd,
{
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    match value.trim().parse() {
        Ok(parsed) if range.contains(&parsed) => Ok(parsed),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}
