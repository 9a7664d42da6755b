//! Auto-publish orchestration: deciding which content is cross-posted,
//! fanning it out into per-platform jobs, and draining those jobs to a
//! dispatcher.

pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod settings;

pub use error::PublishError;
pub use manager::{AutoPublishManager, DrainReport};
