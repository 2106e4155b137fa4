//! Plugin dashboard catalog.
//!
//! Answers two questions for the reconciler: which dashboards does a plugin
//! bundle (and how do they compare to what is stored), and what is the full
//! payload of one bundled dashboard.

mod bundled;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;

pub use bundled::{BundledDashboardCatalog, diff_plugin_dashboards};

use crate::error::SyncResult;

/// Comparison of one plugin dashboard against stored state.
///
/// Recomputed on every query; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDashboardRecord {
    pub plugin_id: String,
    pub org_id: i64,
    /// Path of the dashboard inside the plugin. Empty for removed records.
    pub reference: String,
    pub title: String,
    pub slug: String,
    /// Revision bundled with the installed plugin version.
    pub revision: i64,
    /// True if a stored dashboard matches this one.
    pub imported: bool,
    /// Revision of the stored copy, 0 if never imported.
    pub imported_revision: i64,
    /// The plugin no longer bundles a dashboard that is still stored.
    pub removed: bool,
    /// Stored dashboard id, if any.
    pub dashboard_id: Option<i64>,
}

impl PluginDashboardRecord {
    /// True when the stored copy lags the bundled revision.
    pub fn is_outdated(&self) -> bool {
        !self.removed && self.imported_revision != self.revision
    }
}

/// A bundled dashboard loaded from a plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDashboard {
    pub title: String,
    pub slug: String,
    pub revision: i64,
    pub data: JsonValue,
}

/// Source of plugin-bundled dashboards.
#[async_trait]
pub trait PluginDashboardCatalog: Send + Sync {
    /// Compare a plugin's bundled dashboards with those stored for `org_id`.
    async fn list_plugin_dashboards(
        &self,
        org_id: i64,
        plugin_id: &str,
    ) -> SyncResult<Vec<PluginDashboardRecord>>;

    /// Load the full payload of a bundled dashboard.
    async fn load_plugin_dashboard(
        &self,
        plugin_id: &str,
        reference: &str,
    ) -> SyncResult<LoadedDashboard>;
}
