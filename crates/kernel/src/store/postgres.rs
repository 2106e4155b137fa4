//! PostgreSQL implementations of the settings and dashboard stores.
//!
//! Each mutation is a single statement, so a cancelled call either commits
//! fully or not at all.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{
    DashboardImporter, DashboardStore, ImportDashboardRequest, PluginSettingsStore,
    slug_claimed_error, validate_import,
};
use crate::error::{SyncError, SyncResult};
use crate::models::{PluginSetting, SaveDashboard, StoredDashboard};

/// Settings store backed by the `plugin_setting` table.
#[derive(Clone)]
pub struct PgPluginSettingsStore {
    pool: PgPool,
}

impl PgPluginSettingsStore {
    /// Create a new store with a database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PluginSettingsStore for PgPluginSettingsStore {
    async fn list_settings(&self, org_id: Option<i64>) -> SyncResult<Vec<PluginSetting>> {
        PluginSetting::list(&self.pool, org_id)
            .await
            .map_err(SyncError::StoreUnavailable)
    }

    async fn get_setting(&self, org_id: i64, plugin_id: &str) -> SyncResult<PluginSetting> {
        PluginSetting::find(&self.pool, org_id, plugin_id)
            .await
            .map_err(SyncError::StoreUnavailable)?
            .ok_or_else(|| SyncError::not_found("plugin setting", setting_key(org_id, plugin_id)))
    }

    async fn update_version(
        &self,
        org_id: i64,
        plugin_id: &str,
        version: &str,
    ) -> SyncResult<()> {
        let updated = PluginSetting::update_version(&self.pool, org_id, plugin_id, version)
            .await
            .map_err(SyncError::StoreUnavailable)?;

        if updated {
            Ok(())
        } else {
            Err(SyncError::not_found(
                "plugin setting",
                setting_key(org_id, plugin_id),
            ))
        }
    }

    async fn set_enabled(
        &self,
        org_id: i64,
        plugin_id: &str,
        enabled: bool,
    ) -> SyncResult<PluginSetting> {
        PluginSetting::set_enabled(&self.pool, org_id, plugin_id, enabled)
            .await
            .map_err(SyncError::StoreUnavailable)
    }
}

impl std::fmt::Debug for PgPluginSettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPluginSettingsStore").finish()
    }
}

/// Dashboard store and importer backed by the `dashboard` table.
#[derive(Clone)]
pub struct PgDashboardStore {
    pool: PgPool,
}

impl PgDashboardStore {
    /// Create a new store with a database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DashboardImporter for PgDashboardStore {
    async fn import_dashboard(&self, request: ImportDashboardRequest) -> SyncResult<i64> {
        let validated = validate_import(&request)?;

        let input = SaveDashboard {
            org_id: request.org_id,
            plugin_id: request.plugin_id.clone(),
            title: validated.title,
            slug: validated.slug,
            data: request.payload,
            updated_by: request.principal.to_string(),
        };

        let saved = if request.overwrite {
            StoredDashboard::upsert(&self.pool, &input)
                .await
                .map_err(SyncError::StoreUnavailable)?
                .ok_or_else(|| slug_claimed_error(&input.slug, input.org_id))?
        } else {
            StoredDashboard::insert(&self.pool, &input)
                .await
                .map_err(SyncError::StoreUnavailable)?
                .ok_or_else(|| {
                    SyncError::validation(format!(
                        "a dashboard with slug '{}' already exists in org {}",
                        input.slug, input.org_id
                    ))
                })?
        };

        debug!(
            org_id = saved.org_id,
            plugin_id = %saved.plugin_id,
            dashboard_id = saved.id,
            slug = %saved.slug,
            "dashboard saved"
        );

        Ok(saved.id)
    }
}

#[async_trait]
impl DashboardStore for PgDashboardStore {
    async fn delete_dashboard(&self, dashboard_id: i64, org_id: i64) -> SyncResult<()> {
        let deleted = StoredDashboard::delete(&self.pool, dashboard_id, org_id)
            .await
            .map_err(SyncError::StoreUnavailable)?;

        if deleted {
            Ok(())
        } else {
            Err(SyncError::not_found(
                "dashboard",
                format!("{org_id}/{dashboard_id}"),
            ))
        }
    }

    async fn list_by_plugin(
        &self,
        org_id: i64,
        plugin_id: &str,
    ) -> SyncResult<Vec<StoredDashboard>> {
        StoredDashboard::list_by_plugin(&self.pool, org_id, plugin_id)
            .await
            .map_err(SyncError::StoreUnavailable)
    }
}

impl std::fmt::Debug for PgDashboardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDashboardStore").finish()
    }
}

fn setting_key(org_id: i64, plugin_id: &str) -> String {
    format!("{org_id}/{plugin_id}")
}
