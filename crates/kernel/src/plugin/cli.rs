//! CLI command implementations for plugin management.
//!
//! These commands run against the same state the server builds, but in a
//! separate process: state changes are applied here directly instead of
//! going through the Redis notification channel.

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;

use super::PluginLookup;
use crate::events::{PluginStateChanged, PluginStateHandler};
use crate::reconciler::{DashboardAction, plan_action};
use crate::state::AppState;

/// List plugin settings with their installed version and sync state.
pub async fn cmd_plugin_list(state: &AppState, org_id: Option<i64>) -> Result<()> {
    let settings = state
        .settings()
        .list_settings(org_id)
        .await
        .context("failed to list plugin settings")?;

    if settings.is_empty() {
        println!("No plugin settings found.");
        return Ok(());
    }

    println!(
        "{:<6} {:<24} {:<9} {:<12} {:<12} {:<14}",
        "ORG", "PLUGIN", "ENABLED", "SYNCED", "INSTALLED", "STATE"
    );
    println!("{}", "-".repeat(82));

    for setting in &settings {
        let installed = state.registry().plugin(&setting.plugin_id);
        let installed_version = installed.as_ref().map_or("-", |p| p.version.as_str());

        let sync_state = match &installed {
            None => "not installed",
            Some(_) if !setting.enabled => "disabled",
            Some(p) if setting.needs_sync(&p.version) => "needs sync",
            Some(_) => "up to date",
        };

        let synced = if setting.plugin_version.is_empty() {
            "-"
        } else {
            setting.plugin_version.as_str()
        };

        println!(
            "{:<6} {:<24} {:<9} {:<12} {:<12} {}",
            setting.org_id,
            setting.plugin_id,
            if setting.enabled { "yes" } else { "no" },
            synced,
            installed_version,
            sync_state
        );
    }

    Ok(())
}

/// Show a plugin's bundled dashboards compared with stored ones.
pub async fn cmd_plugin_dashboards(state: &AppState, org_id: i64, name: &str) -> Result<()> {
    let records = state
        .catalog()
        .list_plugin_dashboards(org_id, name)
        .await
        .with_context(|| format!("failed to list dashboards of plugin '{name}'"))?;

    if records.is_empty() {
        println!("Plugin '{name}' has no dashboards in org {org_id}.");
        return Ok(());
    }

    println!(
        "{:<32} {:<28} {:<5} {:<9} {:<8}",
        "TITLE", "SLUG", "REV", "IMPORTED", "ACTION"
    );
    println!("{}", "-".repeat(86));

    for record in &records {
        let imported = if record.imported {
            record.imported_revision.to_string()
        } else {
            "-".to_string()
        };

        let action = match plan_action(record) {
            DashboardAction::Delete(_) => "delete",
            DashboardAction::Import => "import",
            DashboardAction::Keep => "keep",
        };

        println!(
            "{:<32} {:<28} {:<5} {:<9} {}",
            record.title, record.slug, record.revision, imported, action
        );
    }

    Ok(())
}

/// Enable a plugin for an organization and sync its dashboards.
pub async fn cmd_plugin_enable(
    state: &AppState,
    org_id: i64,
    name: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    if state.registry().plugin(name).is_none() {
        bail!(
            "plugin '{name}' is not installed. Add it to the plugins directory and try again."
        );
    }

    set_plugin_state(state, PluginStateChanged::enabled(org_id, name), cancel).await?;
    println!("Plugin '{name}' enabled in org {org_id}; dashboards synced.");
    Ok(())
}

/// Disable a plugin for an organization and remove its dashboards.
pub async fn cmd_plugin_disable(
    state: &AppState,
    org_id: i64,
    name: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    set_plugin_state(state, PluginStateChanged::disabled(org_id, name), cancel).await?;
    println!("Plugin '{name}' disabled in org {org_id}; dashboards removed.");
    Ok(())
}

/// Force a sync pass regardless of the recorded version.
pub async fn cmd_plugin_sync(
    state: &AppState,
    org_id: i64,
    name: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let plugin = state
        .registry()
        .plugin(name)
        .with_context(|| format!("plugin '{name}' is not installed"))?;

    let summary = state
        .reconciler()
        .sync_plugin_dashboards(org_id, &plugin, cancel)
        .await
        .with_context(|| format!("failed to sync dashboards of plugin '{name}'"))?;

    println!(
        "Synced '{}' v{} in org {}: {} imported, {} deleted, {} unchanged.",
        name, plugin.version, org_id, summary.imported, summary.deleted, summary.unchanged
    );
    if !summary.version_recorded {
        println!("Warning: plugin version was not recorded; the next sweep will retry.");
    }

    Ok(())
}

/// Persist the enabled flag, then run the handler in-process.
async fn set_plugin_state(
    state: &AppState,
    event: PluginStateChanged,
    cancel: &CancellationToken,
) -> Result<()> {
    state
        .settings()
        .set_enabled(event.org_id, &event.plugin_id, event.enabled)
        .await
        .with_context(|| format!("failed to update setting of plugin '{}'", event.plugin_id))?;

    state
        .reconciler()
        .on_plugin_state_changed(&event, cancel)
        .await
        .with_context(|| {
            format!(
                "plugin '{}' state saved, but updating its dashboards failed",
                event.plugin_id
            )
        })?;

    Ok(())
}
