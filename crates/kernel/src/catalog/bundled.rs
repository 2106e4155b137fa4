//! Catalog over dashboards shipped inside plugin directories.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{LoadedDashboard, PluginDashboardCatalog, PluginDashboardRecord};
use crate::error::{SyncError, SyncResult};
use crate::models::{StoredDashboard, payload_revision, payload_title, slugify};
use crate::plugin::{PluginLookup, PluginRegistry, is_contained_path};
use crate::store::DashboardStore;

/// Catalog reading dashboard JSON files from installed plugins.
pub struct BundledDashboardCatalog {
    registry: Arc<PluginRegistry>,
    dashboards: Arc<dyn DashboardStore>,
}

impl BundledDashboardCatalog {
    /// Create a catalog over `registry`, comparing against `dashboards`.
    pub fn new(registry: Arc<PluginRegistry>, dashboards: Arc<dyn DashboardStore>) -> Self {
        Self {
            registry,
            dashboards,
        }
    }
}

#[async_trait]
impl PluginDashboardCatalog for BundledDashboardCatalog {
    async fn list_plugin_dashboards(
        &self,
        org_id: i64,
        plugin_id: &str,
    ) -> SyncResult<Vec<PluginDashboardRecord>> {
        let plugin = self
            .registry
            .plugin(plugin_id)
            .ok_or_else(|| SyncError::not_found("plugin", plugin_id))?;

        let mut bundled = Vec::with_capacity(plugin.dashboards.len());
        for include in &plugin.dashboards {
            let loaded = self
                .load_plugin_dashboard(plugin_id, &include.reference)
                .await?;
            bundled.push((include.reference.clone(), loaded));
        }
        ensure_unique_slugs(plugin_id, &bundled)?;

        let stored = self
            .dashboards
            .list_by_plugin(org_id, plugin_id)
            .await
            .map_err(|e| match e {
                SyncError::StoreUnavailable(inner) => SyncError::CatalogUnavailable(inner),
                other => other,
            })?;

        Ok(diff_plugin_dashboards(org_id, plugin_id, bundled, &stored))
    }

    async fn load_plugin_dashboard(
        &self,
        plugin_id: &str,
        reference: &str,
    ) -> SyncResult<LoadedDashboard> {
        let dir = self
            .registry
            .plugin_dir(plugin_id)
            .ok_or_else(|| SyncError::not_found("plugin", plugin_id))?;

        if !is_contained_path(reference) {
            return Err(SyncError::not_found(
                "plugin dashboard",
                format!("{plugin_id}/{reference}"),
            ));
        }

        let path = dir.join(reference);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError::not_found("plugin dashboard", format!("{plugin_id}/{reference}"))
            } else {
                SyncError::CatalogUnavailable(
                    anyhow!(e).context(format!("failed to read {}", path.display())),
                )
            }
        })?;

        let data: JsonValue = serde_json::from_str(&content).map_err(|e| {
            SyncError::validation(format!(
                "plugin '{plugin_id}' dashboard '{reference}' is not valid JSON: {e}"
            ))
        })?;

        debug!(plugin_id, reference, "loaded plugin dashboard");
        loaded_dashboard(plugin_id, reference, data)
    }
}

fn loaded_dashboard(
    plugin_id: &str,
    reference: &str,
    data: JsonValue,
) -> SyncResult<LoadedDashboard> {
    if !data.is_object() {
        return Err(SyncError::validation(format!(
            "plugin '{plugin_id}' dashboard '{reference}' is not a JSON object"
        )));
    }

    let title = payload_title(&data)
        .ok_or_else(|| {
            SyncError::validation(format!(
                "plugin '{plugin_id}' dashboard '{reference}' has no title"
            ))
        })?
        .to_string();

    Ok(LoadedDashboard {
        slug: slugify(&title),
        revision: payload_revision(&data),
        title,
        data,
    })
}

/// Reject a plugin bundling two dashboards whose titles give the same slug.
///
/// Both would be saved to the same `(org_id, slug)` row, so neither could
/// ever be recorded as up to date.
fn ensure_unique_slugs(plugin_id: &str, bundled: &[(String, LoadedDashboard)]) -> SyncResult<()> {
    let mut seen: HashMap<&str, &str> = HashMap::with_capacity(bundled.len());

    for (reference, dashboard) in bundled {
        if let Some(first) = seen.insert(dashboard.slug.as_str(), reference.as_str()) {
            return Err(SyncError::validation(format!(
                "plugin '{plugin_id}' dashboards '{first}' and '{reference}' share slug '{}'",
                dashboard.slug
            )));
        }
    }

    Ok(())
}

/// Compare bundled dashboards with the stored ones attributed to the plugin.
///
/// Dashboards match by slug. Bundled dashboards come first in manifest
/// order; stored dashboards nothing matched follow as removed records.
pub fn diff_plugin_dashboards(
    org_id: i64,
    plugin_id: &str,
    bundled: Vec<(String, LoadedDashboard)>,
    stored: &[StoredDashboard],
) -> Vec<PluginDashboardRecord> {
    let mut matched: HashSet<i64> = HashSet::new();
    let mut records = Vec::with_capacity(bundled.len() + stored.len());

    for (reference, dashboard) in bundled {
        let existing = stored
            .iter()
            .find(|s| s.slug == dashboard.slug && !matched.contains(&s.id));

        if let Some(existing) = existing {
            matched.insert(existing.id);
        }

        records.push(PluginDashboardRecord {
            plugin_id: plugin_id.to_string(),
            org_id,
            reference,
            title: dashboard.title,
            slug: dashboard.slug,
            revision: dashboard.revision,
            imported: existing.is_some(),
            imported_revision: existing.map(StoredDashboard::revision).unwrap_or(0),
            removed: false,
            dashboard_id: existing.map(|s| s.id),
        });
    }

    for dashboard in stored.iter().filter(|s| !matched.contains(&s.id)) {
        records.push(PluginDashboardRecord {
            plugin_id: plugin_id.to_string(),
            org_id,
            reference: String::new(),
            title: dashboard.title.clone(),
            slug: dashboard.slug.clone(),
            revision: dashboard.revision(),
            imported: true,
            imported_revision: dashboard.revision(),
            removed: true,
            dashboard_id: Some(dashboard.id),
        });
    }

    records
}
