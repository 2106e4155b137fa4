//! Storage abstraction for plugin settings and dashboards.
//!
//! The reconciler only ever talks to these traits. [`PgPluginSettingsStore`]
//! and [`PgDashboardStore`] are the PostgreSQL implementations; tests swap in
//! in-memory ones.

mod postgres;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

pub use postgres::{PgDashboardStore, PgPluginSettingsStore};

use crate::error::{SyncError, SyncResult};
use crate::models::{
    MAX_PLUGIN_ID_LENGTH, MAX_TITLE_LENGTH, PluginSetting, StoredDashboard, payload_title,
    slugify,
};
use crate::principal::Principal;

/// Per (organization, plugin) settings.
#[async_trait]
pub trait PluginSettingsStore: Send + Sync {
    /// List settings across all organizations, or one if `org_id` is set.
    async fn list_settings(&self, org_id: Option<i64>) -> SyncResult<Vec<PluginSetting>>;

    /// Load one setting; `NotFound` if the pair has no row.
    async fn get_setting(&self, org_id: i64, plugin_id: &str) -> SyncResult<PluginSetting>;

    /// Record the plugin version dashboards were last synchronized at.
    async fn update_version(&self, org_id: i64, plugin_id: &str, version: &str)
    -> SyncResult<()>;

    /// Enable or disable a plugin for an organization, creating the row if needed.
    async fn set_enabled(
        &self,
        org_id: i64,
        plugin_id: &str,
        enabled: bool,
    ) -> SyncResult<PluginSetting>;
}

/// Request to import a plugin dashboard.
#[derive(Debug, Clone)]
pub struct ImportDashboardRequest {
    pub plugin_id: String,
    pub org_id: i64,
    /// Path of the dashboard inside the plugin.
    pub reference: String,
    pub payload: JsonValue,
    /// Replace an existing dashboard with the same slug.
    pub overwrite: bool,
    /// Identity the write is attributed to.
    pub principal: Principal,
}

/// Dashboard import pipeline.
#[async_trait]
pub trait DashboardImporter: Send + Sync {
    /// Save a plugin dashboard, returning its stored id.
    async fn import_dashboard(&self, request: ImportDashboardRequest) -> SyncResult<i64>;
}

/// Persisted dashboards.
#[async_trait]
pub trait DashboardStore: Send + Sync {
    /// Delete a dashboard; `NotFound` if the id does not exist in the org.
    async fn delete_dashboard(&self, dashboard_id: i64, org_id: i64) -> SyncResult<()>;

    /// Dashboards currently attributed to a plugin within an organization.
    async fn list_by_plugin(&self, org_id: i64, plugin_id: &str)
    -> SyncResult<Vec<StoredDashboard>>;
}

/// True if an import from `plugin_id` may replace a dashboard owned by `owner`.
///
/// User dashboards (empty owner) and the plugin's own dashboards can be
/// replaced. Another plugin's dashboard cannot.
pub fn can_overwrite(owner: &str, plugin_id: &str) -> bool {
    owner.is_empty() || owner == plugin_id
}

/// Error for an import whose slug is held by another plugin's dashboard.
pub fn slug_claimed_error(slug: &str, org_id: i64) -> SyncError {
    SyncError::validation(format!(
        "dashboard slug '{slug}' in org {org_id} belongs to another plugin"
    ))
}

/// Title and slug of a payload that passed import validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedImport {
    pub title: String,
    pub slug: String,
}

/// Check an import request before anything is written.
///
/// The payload must be a JSON object with a non-empty string `title` whose
/// slug is non-empty, and the principal must be allowed to write in the
/// target organization. Titles, slugs and plugin ids must fit their columns.
pub fn validate_import(request: &ImportDashboardRequest) -> SyncResult<ValidatedImport> {
    if !request.principal.can_write_dashboards(request.org_id) {
        return Err(SyncError::validation(format!(
            "principal {} may not write dashboards in org {}",
            request.principal, request.org_id
        )));
    }

    if request.plugin_id.chars().count() > MAX_PLUGIN_ID_LENGTH {
        return Err(SyncError::validation(format!(
            "plugin id '{}' is longer than {MAX_PLUGIN_ID_LENGTH} characters",
            request.plugin_id
        )));
    }

    if !request.payload.is_object() {
        return Err(SyncError::validation(format!(
            "dashboard '{}' of plugin '{}' is not a JSON object",
            request.reference, request.plugin_id
        )));
    }

    let title = payload_title(&request.payload).ok_or_else(|| {
        SyncError::validation(format!(
            "dashboard '{}' of plugin '{}' has no title",
            request.reference, request.plugin_id
        ))
    })?;

    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(SyncError::validation(format!(
            "dashboard '{}' of plugin '{}' has a title longer than {MAX_TITLE_LENGTH} characters",
            request.reference, request.plugin_id
        )));
    }

    let slug = slugify(title);
    if slug.is_empty() {
        return Err(SyncError::validation(format!(
            "dashboard title '{title}' does not produce a usable slug"
        )));
    }
    if slug.len() > MAX_TITLE_LENGTH {
        return Err(SyncError::validation(format!(
            "dashboard slug '{slug}' is longer than {MAX_TITLE_LENGTH} characters"
        )));
    }

    Ok(ValidatedImport {
        title: title.to_string(),
        slug,
    })
}
