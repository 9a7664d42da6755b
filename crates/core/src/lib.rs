//! Domain types and pure policy for SMO Social auto-publishing.
//!
//! Nothing in this crate performs I/O. Storage lives in `smo-db`, and the
//! orchestration that ties policy to storage lives in `smo-autopublish`.

pub mod auth;
pub mod config;
pub mod content;
pub mod eligibility;
pub mod retry;
pub mod settings;
pub mod types;
