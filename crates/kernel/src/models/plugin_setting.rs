//! Plugin setting model.
//!
//! One row per (organization, plugin) pair: whether the plugin is enabled in
//! that organization and which plugin version its dashboards were last
//! synchronized at.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Longest plugin identifier the `plugin_setting` table stores.
pub const MAX_PLUGIN_ID_LENGTH: usize = 190;

/// Longest plugin version the `plugin_setting` table stores.
pub const MAX_VERSION_LENGTH: usize = 50;

/// Plugin setting record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PluginSetting {
    /// Owning organization.
    pub org_id: i64,

    /// Plugin identifier (matches the manifest `name`).
    pub plugin_id: String,

    /// Whether the plugin is enabled for this organization.
    pub enabled: bool,

    /// Plugin version the dashboards were last synchronized at.
    /// Empty until the first successful sync pass.
    pub plugin_version: String,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last updated.
    pub updated: i64,
}

impl PluginSetting {
    /// List settings, optionally restricted to one organization.
    pub async fn list(pool: &PgPool, org_id: Option<i64>) -> Result<Vec<Self>> {
        let settings = sqlx::query_as::<_, PluginSetting>(
            r#"
            SELECT org_id, plugin_id, enabled, plugin_version, created, updated
            FROM plugin_setting
            WHERE $1::BIGINT IS NULL OR org_id = $1
            ORDER BY org_id, plugin_id
            "#,
        )
        .bind(org_id)
        .fetch_all(pool)
        .await
        .context("failed to list plugin settings")?;

        Ok(settings)
    }

    /// Find the setting for one (organization, plugin) pair.
    pub async fn find(pool: &PgPool, org_id: i64, plugin_id: &str) -> Result<Option<Self>> {
        let setting = sqlx::query_as::<_, PluginSetting>(
            r#"
            SELECT org_id, plugin_id, enabled, plugin_version, created, updated
            FROM plugin_setting
            WHERE org_id = $1 AND plugin_id = $2
            "#,
        )
        .bind(org_id)
        .bind(plugin_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plugin setting")?;

        Ok(setting)
    }

    /// Record the plugin version dashboards were synchronized at.
    ///
    /// Returns false if no row exists for the pair.
    pub async fn update_version(
        pool: &PgPool,
        org_id: i64,
        plugin_id: &str,
        version: &str,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE plugin_setting SET plugin_version = $1, updated = $2 \
             WHERE org_id = $3 AND plugin_id = $4",
        )
        .bind(version)
        .bind(now)
        .bind(org_id)
        .bind(plugin_id)
        .execute(pool)
        .await
        .context("failed to update plugin setting version")?;

        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable a plugin, creating the row on first use.
    pub async fn set_enabled(
        pool: &PgPool,
        org_id: i64,
        plugin_id: &str,
        enabled: bool,
    ) -> Result<Self> {
        let now = chrono::Utc::now().timestamp();

        let setting = sqlx::query_as::<_, PluginSetting>(
            r#"
            INSERT INTO plugin_setting (org_id, plugin_id, enabled, plugin_version, created, updated)
            VALUES ($1, $2, $3, '', $4, $4)
            ON CONFLICT (org_id, plugin_id) DO UPDATE SET enabled = $3, updated = $4
            RETURNING org_id, plugin_id, enabled, plugin_version, created, updated
            "#,
        )
        .bind(org_id)
        .bind(plugin_id)
        .bind(enabled)
        .bind(now)
        .fetch_one(pool)
        .await
        .context("failed to save plugin setting")?;

        Ok(setting)
    }

    /// True when the recorded version differs from the plugin's current one.
    pub fn needs_sync(&self, current_version: &str) -> bool {
        self.enabled && self.plugin_version != current_version
    }
}
