//! Dashboard reconciler.
//!
//! Converges stored dashboards with the dashboards bundled in installed
//! plugins:
//!
//! - **Startup sweep** ([`DashboardReconciler::reconcile_all`]): every enabled
//!   plugin whose recorded version differs from the installed one gets a
//!   sync pass. Failures are logged per plugin and never stop the sweep.
//! - **Sync pass** ([`DashboardReconciler::sync_plugin_dashboards`]): deletes
//!   dashboards the plugin dropped, re-imports outdated ones, then records
//!   the plugin version. The first failing mutation ends the pass and leaves
//!   the version untouched so the next sweep retries.
//! - **Teardown pass** ([`DashboardReconciler::teardown_plugin_dashboards`]):
//!   deletes every dashboard attributed to a disabled plugin.
//!
//! No state survives between passes; each one re-reads the stores. Passes
//! for the same (organization, plugin) key are serialized with [`PassLocks`].

mod locks;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use locks::PassLocks;

use crate::catalog::{PluginDashboardCatalog, PluginDashboardRecord};
use crate::error::{SyncError, SyncResult};
use crate::events::{PluginStateChanged, PluginStateHandler};
use crate::metrics::Metrics;
use crate::plugin::{PluginDescriptor, PluginLookup};
use crate::principal::Principal;
use crate::store::{
    DashboardImporter, DashboardStore, ImportDashboardRequest, PluginSettingsStore,
};

/// Collaborators the reconciler drives.
#[derive(Clone)]
pub struct ReconcilerDeps {
    pub plugins: Arc<dyn PluginLookup>,
    pub catalog: Arc<dyn PluginDashboardCatalog>,
    pub importer: Arc<dyn DashboardImporter>,
    pub dashboards: Arc<dyn DashboardStore>,
    pub settings: Arc<dyn PluginSettingsStore>,
}

/// What a sync pass does with one catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardAction {
    /// Delete the stored dashboard with this id.
    Delete(i64),
    /// Load the bundled payload and import it with overwrite.
    Import,
    /// Already in sync.
    Keep,
}

/// Decide what to do with a record. Removal wins over a revision mismatch.
pub fn plan_action(record: &PluginDashboardRecord) -> DashboardAction {
    if record.removed {
        return match record.dashboard_id {
            Some(id) => DashboardAction::Delete(id),
            None => DashboardAction::Keep,
        };
    }

    if record.imported_revision != record.revision {
        DashboardAction::Import
    } else {
        DashboardAction::Keep
    }
}

/// Result of a successful sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub imported: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// False if the final version write-back failed (logged, retried next sweep).
    pub version_recorded: bool,
}

/// Outcome of a startup sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Settings rows examined.
    pub examined: usize,
    pub skipped_disabled: usize,
    /// Enabled rows whose plugin is no longer installed.
    pub skipped_uninstalled: usize,
    /// Enabled rows already synchronized at the installed version.
    pub up_to_date: usize,
    pub synced: usize,
    pub failed: usize,
    /// False if the settings list could not be read.
    pub completed: bool,
}

/// Reconciles plugin-bundled dashboards with stored dashboards.
pub struct DashboardReconciler {
    deps: ReconcilerDeps,
    metrics: Arc<Metrics>,
    locks: PassLocks,
}

impl DashboardReconciler {
    /// Create a reconciler over explicit collaborators.
    pub fn new(deps: ReconcilerDeps, metrics: Arc<Metrics>) -> Self {
        Self {
            deps,
            metrics,
            locks: PassLocks::new(),
        }
    }

    /// Sweep all plugin settings and sync every enabled, outdated plugin.
    ///
    /// Never fails: a settings read failure aborts the sweep, and per-plugin
    /// failures are logged and counted.
    pub async fn reconcile_all(&self, cancel: &CancellationToken) -> SweepReport {
        debug!("looking for plugin dashboard updates");
        let mut report = SweepReport::default();

        let settings = match call(cancel, self.deps.settings.list_settings(None)).await {
            Ok(settings) => settings,
            Err(e) => {
                error!(error = %e, "failed to list plugin settings, skipping dashboard sweep");
                return report;
            }
        };

        for setting in settings {
            if cancel.is_cancelled() {
                warn!(examined = report.examined, "dashboard sweep cancelled");
                return report;
            }

            report.examined += 1;

            if !setting.enabled {
                report.skipped_disabled += 1;
                continue;
            }

            let Some(plugin) = self.deps.plugins.plugin(&setting.plugin_id) else {
                debug!(
                    org_id = setting.org_id,
                    plugin_id = %setting.plugin_id,
                    "plugin not installed, skipping"
                );
                report.skipped_uninstalled += 1;
                continue;
            };

            if !setting.needs_sync(&plugin.version) {
                report.up_to_date += 1;
                continue;
            }

            match self
                .sync_plugin_dashboards(setting.org_id, &plugin, cancel)
                .await
            {
                Ok(_) => report.synced += 1,
                // Already logged by the pass.
                Err(_) => report.failed += 1,
            }
        }

        report.completed = true;
        info!(
            examined = report.examined,
            synced = report.synced,
            failed = report.failed,
            up_to_date = report.up_to_date,
            "dashboard sweep complete"
        );
        report
    }

    /// Run a sync pass for one plugin in one organization.
    ///
    /// Errors are logged here and returned to the caller.
    pub async fn sync_plugin_dashboards(
        &self,
        org_id: i64,
        plugin: &PluginDescriptor,
        cancel: &CancellationToken,
    ) -> SyncResult<PassSummary> {
        let _guard = call(cancel, async {
            Ok(self.locks.acquire(org_id, &plugin.id).await)
        })
        .await?;

        let started = Instant::now();
        let result = self.run_sync_pass(org_id, plugin, cancel).await;
        self.metrics.record_pass(
            "sync",
            outcome_label(&result),
            started.elapsed().as_secs_f64(),
        );

        match &result {
            Ok(summary) => info!(
                org_id,
                plugin_id = %plugin.id,
                imported = summary.imported,
                deleted = summary.deleted,
                unchanged = summary.unchanged,
                "plugin dashboards synced"
            ),
            Err(e) => error!(
                org_id,
                plugin_id = %plugin.id,
                error = %e,
                retry = e.is_transient(),
                "failed to sync plugin dashboards"
            ),
        }

        result
    }

    async fn run_sync_pass(
        &self,
        org_id: i64,
        plugin: &PluginDescriptor,
        cancel: &CancellationToken,
    ) -> SyncResult<PassSummary> {
        info!(org_id, plugin_id = %plugin.id, version = %plugin.version, "syncing plugin dashboards");

        let records = call(
            cancel,
            self.deps.catalog.list_plugin_dashboards(org_id, &plugin.id),
        )
        .await?;

        let mut plan: Vec<(&PluginDashboardRecord, DashboardAction)> =
            records.iter().map(|r| (r, plan_action(r))).collect();
        // Deletions first: a failed deletion stops the pass before any import.
        plan.sort_by_key(|(_, action)| !matches!(action, DashboardAction::Delete(_)));

        let mut summary = PassSummary::default();

        for (record, action) in plan {
            match action {
                DashboardAction::Delete(dashboard_id) => {
                    info!(
                        org_id,
                        plugin_id = %plugin.id,
                        dashboard = %record.slug,
                        "deleting plugin dashboard"
                    );
                    call(
                        cancel,
                        self.deps.dashboards.delete_dashboard(dashboard_id, org_id),
                    )
                    .await?;
                    self.metrics.record_delete();
                    summary.deleted += 1;
                }
                DashboardAction::Import => {
                    self.import_dashboard(org_id, &plugin.id, record, cancel)
                        .await?;
                    summary.imported += 1;
                }
                DashboardAction::Keep => summary.unchanged += 1,
            }
        }

        summary.version_recorded = self.record_synced_version(org_id, plugin, cancel).await?;
        Ok(summary)
    }

    async fn import_dashboard(
        &self,
        org_id: i64,
        plugin_id: &str,
        record: &PluginDashboardRecord,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        let loaded = call(
            cancel,
            self.deps
                .catalog
                .load_plugin_dashboard(plugin_id, &record.reference),
        )
        .await?;

        info!(
            org_id,
            plugin_id,
            dashboard = %loaded.title,
            new_rev = record.revision,
            old_rev = record.imported_revision,
            "auto updating plugin dashboard"
        );

        let request = ImportDashboardRequest {
            plugin_id: plugin_id.to_string(),
            org_id,
            reference: record.reference.clone(),
            payload: loaded.data,
            overwrite: true,
            principal: Principal::system_admin(org_id),
        };

        call(cancel, self.deps.importer.import_dashboard(request)).await?;
        self.metrics.record_import();
        Ok(())
    }

    /// Write the plugin version back to its setting.
    ///
    /// Store failures are logged and reported as `Ok(false)`; the dashboard
    /// changes already made stay applied. Only cancellation is an error.
    async fn record_synced_version(
        &self,
        org_id: i64,
        plugin: &PluginDescriptor,
        cancel: &CancellationToken,
    ) -> SyncResult<bool> {
        let setting = match call(cancel, self.deps.settings.get_setting(org_id, &plugin.id)).await
        {
            Ok(setting) => setting,
            Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
            Err(e) => {
                error!(org_id, plugin_id = %plugin.id, error = %e, "failed to read plugin setting");
                return Ok(false);
            }
        };

        match call(
            cancel,
            self.deps
                .settings
                .update_version(setting.org_id, &setting.plugin_id, &plugin.version),
        )
        .await
        {
            Ok(()) => Ok(true),
            Err(SyncError::Cancelled) => Err(SyncError::Cancelled),
            Err(e) => {
                error!(
                    org_id,
                    plugin_id = %plugin.id,
                    error = %e,
                    "failed to update plugin setting version"
                );
                Ok(false)
            }
        }
    }

    /// Delete every stored dashboard attributed to a plugin in an organization.
    ///
    /// Uses the dashboard store rather than the catalog, since the plugin may
    /// already be uninstalled. Stops at the first failed deletion; returns the
    /// number of dashboards deleted.
    pub async fn teardown_plugin_dashboards(
        &self,
        org_id: i64,
        plugin_id: &str,
        cancel: &CancellationToken,
    ) -> SyncResult<usize> {
        let _guard = call(cancel, async {
            Ok(self.locks.acquire(org_id, plugin_id).await)
        })
        .await?;

        let started = Instant::now();
        let result = self.run_teardown_pass(org_id, plugin_id, cancel).await;
        self.metrics.record_pass(
            "teardown",
            outcome_label(&result),
            started.elapsed().as_secs_f64(),
        );

        result
    }

    async fn run_teardown_pass(
        &self,
        org_id: i64,
        plugin_id: &str,
        cancel: &CancellationToken,
    ) -> SyncResult<usize> {
        let stored = call(cancel, self.deps.dashboards.list_by_plugin(org_id, plugin_id)).await?;

        let mut deleted = 0usize;
        for dashboard in &stored {
            info!(
                org_id,
                plugin_id,
                dashboard = %dashboard.slug,
                "deleting plugin dashboard"
            );
            call(
                cancel,
                self.deps
                    .dashboards
                    .delete_dashboard(dashboard.id, dashboard.org_id),
            )
            .await?;
            self.metrics.record_delete();
            deleted += 1;
        }

        Ok(deleted)
    }
}

#[async_trait]
impl PluginStateHandler for DashboardReconciler {
    fn name(&self) -> &str {
        "plugin_dashboards"
    }

    /// Handle a plugin enable/disable notification.
    ///
    /// Enabling an unknown plugin fails with `NotFound` before touching any
    /// store. Pass failures are returned as-is.
    async fn on_plugin_state_changed(
        &self,
        event: &PluginStateChanged,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        info!(
            org_id = event.org_id,
            plugin_id = %event.plugin_id,
            enabled = event.enabled,
            "plugin state changed"
        );

        let result = if event.enabled {
            match self.deps.plugins.plugin(&event.plugin_id) {
                Some(plugin) => self
                    .sync_plugin_dashboards(event.org_id, &plugin, cancel)
                    .await
                    .map(|_| ()),
                None => Err(SyncError::not_found("plugin", &event.plugin_id)),
            }
        } else {
            self.teardown_plugin_dashboards(event.org_id, &event.plugin_id, cancel)
                .await
                .map(|_| ())
        };

        self.metrics.record_event(event.enabled, outcome_label(&result));
        result
    }
}

impl std::fmt::Debug for DashboardReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardReconciler")
            .field("locked_keys", &self.locks.len())
            .finish()
    }
}

/// Await a collaborator call unless `cancel` fires first.
///
/// A cancelled call's future is dropped before it resolves; stores commit
/// each call atomically, so nothing from that call is applied.
async fn call<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = SyncResult<T>>,
) -> SyncResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        result = fut => result,
    }
}

fn outcome_label<T>(result: &SyncResult<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.label(),
    }
}
