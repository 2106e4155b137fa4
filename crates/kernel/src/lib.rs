//! Plugdash Kernel Library
//!
//! Keeps dashboards bundled with installed plugins in step with the
//! dashboards stored per organization. The main entry point is the
//! `plugdash` binary; the library is exposed for integration testing.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod metrics;
pub mod models;
pub mod plugin;
pub mod principal;
pub mod reconciler;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{SyncError, SyncResult};
