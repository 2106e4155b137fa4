//! Plugdash test utilities.
//!
//! In-memory stand-ins for every collaborator the reconciler drives, with a
//! shared call log and failure injection. [`Harness`] wires them together.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use plugdash_kernel::catalog::{
    LoadedDashboard, PluginDashboardCatalog, PluginDashboardRecord, diff_plugin_dashboards,
};
use plugdash_kernel::error::{SyncError, SyncResult};
use plugdash_kernel::metrics::Metrics;
use plugdash_kernel::models::{PluginSetting, StoredDashboard, payload_revision, slugify};
use plugdash_kernel::plugin::{DashboardInclude, PluginDescriptor, PluginLookup};
use plugdash_kernel::reconciler::{DashboardReconciler, ReconcilerDeps};
use plugdash_kernel::store::{
    DashboardImporter, DashboardStore, ImportDashboardRequest, PluginSettingsStore,
    can_overwrite, slug_claimed_error, validate_import,
};

// -------------------------------------------------------------------------
// Call log
// -------------------------------------------------------------------------

/// A collaborator call, recorded before any injected failure applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListPluginDashboards {
        org_id: i64,
        plugin_id: String,
    },
    LoadPluginDashboard {
        plugin_id: String,
        reference: String,
    },
    Import {
        org_id: i64,
        plugin_id: String,
        reference: String,
        overwrite: bool,
        principal: String,
    },
    Delete {
        org_id: i64,
        dashboard_id: i64,
    },
    ListByPlugin {
        org_id: i64,
        plugin_id: String,
    },
    ListSettings {
        org_id: Option<i64>,
    },
    GetSetting {
        org_id: i64,
        plugin_id: String,
    },
    UpdateVersion {
        org_id: i64,
        plugin_id: String,
        version: String,
    },
    SetEnabled {
        org_id: i64,
        plugin_id: String,
        enabled: bool,
    },
}

impl Call {
    /// True for calls that write to a store.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Import { .. }
                | Self::Delete { .. }
                | Self::UpdateVersion { .. }
                | Self::SetEnabled { .. }
        )
    }
}

/// Ordered record of calls, shared by all fakes of one harness.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    /// Snapshot of every call so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Calls that write to a store.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Number of import calls.
    pub fn imports(&self) -> usize {
        self.count(|c| matches!(c, Call::Import { .. }))
    }

    /// Number of delete calls.
    pub fn deletes(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete { .. }))
    }

    /// Number of version write-backs.
    pub fn version_updates(&self) -> usize {
        self.count(|c| matches!(c, Call::UpdateVersion { .. }))
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }
}

// -------------------------------------------------------------------------
// Failure injection
// -------------------------------------------------------------------------

/// Error class an injected failure produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    CatalogUnavailable,
    StoreUnavailable,
    Validation,
}

impl Failure {
    /// Build the matching error for an operation.
    pub fn into_error(self, operation: &str) -> SyncError {
        match self {
            Self::NotFound => SyncError::not_found("injected", operation),
            Self::CatalogUnavailable => {
                SyncError::CatalogUnavailable(anyhow::anyhow!("injected failure in {operation}"))
            }
            Self::StoreUnavailable => {
                SyncError::StoreUnavailable(anyhow::anyhow!("injected failure in {operation}"))
            }
            Self::Validation => SyncError::validation(format!("injected failure in {operation}")),
        }
    }
}

/// What an operation does on its next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Proceed,
    Fail(Failure),
    /// Never complete; only cancellation gets the caller out.
    Hang,
}

/// Per-operation failure plan. Call numbers are 1-based.
#[derive(Debug, Default)]
struct Trigger {
    calls: usize,
    always: Option<Failure>,
    at: Option<(usize, Failure)>,
    hang_at: Option<usize>,
}

impl Trigger {
    fn next(&mut self) -> Step {
        self.calls += 1;
        if self.hang_at == Some(self.calls) {
            return Step::Hang;
        }
        if let Some(failure) = self.always {
            return Step::Fail(failure);
        }
        match self.at {
            Some((n, failure)) if n == self.calls => Step::Fail(failure),
            _ => Step::Proceed,
        }
    }
}

async fn apply(step: Step, operation: &str) -> SyncResult<()> {
    match step {
        Step::Proceed => Ok(()),
        Step::Fail(failure) => Err(failure.into_error(operation)),
        Step::Hang => std::future::pending().await,
    }
}

// -------------------------------------------------------------------------
// Plugin registry
// -------------------------------------------------------------------------

/// Installed plugins, changeable between passes.
#[derive(Debug, Default)]
pub struct FakePluginRegistry {
    plugins: Mutex<HashMap<String, PluginDescriptor>>,
}

impl FakePluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or upgrade a plugin.
    pub fn install(&self, plugin: PluginDescriptor) {
        self.plugins.lock().insert(plugin.id.clone(), plugin);
    }

    pub fn uninstall(&self, plugin_id: &str) {
        self.plugins.lock().remove(plugin_id);
    }
}

impl PluginLookup for FakePluginRegistry {
    fn plugin(&self, plugin_id: &str) -> Option<PluginDescriptor> {
        self.plugins.lock().get(plugin_id).cloned()
    }
}

// -------------------------------------------------------------------------
// Dashboard store
// -------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DashboardRows {
    rows: BTreeMap<i64, StoredDashboard>,
    next_id: i64,
    clock: i64,
    imports: Trigger,
    deletes: Trigger,
    lists: Trigger,
}

impl DashboardRows {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }
}

/// Dashboard importer and store over an in-memory table.
///
/// Mirrors the Postgres store: rows are unique per (org, slug) and every
/// call either applies fully or not at all.
#[derive(Debug)]
pub struct InMemoryDashboardStore {
    log: CallLog,
    inner: Mutex<DashboardRows>,
}

impl InMemoryDashboardStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            inner: Mutex::new(DashboardRows::default()),
        }
    }

    /// Insert a stored dashboard directly, bypassing the call log.
    pub fn seed(&self, org_id: i64, plugin_id: &str, title: &str, revision: i64) -> i64 {
        let data = dashboard_payload(title, revision);
        self.seed_payload(org_id, plugin_id, title, data)
    }

    /// Insert a stored dashboard with an explicit payload.
    pub fn seed_payload(&self, org_id: i64, plugin_id: &str, title: &str, data: JsonValue) -> i64 {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let now = inner.tick();
        inner.rows.insert(
            id,
            StoredDashboard {
                id,
                uid: Uuid::now_v7(),
                org_id,
                plugin_id: plugin_id.to_string(),
                title: title.to_string(),
                slug: slugify(title),
                data,
                updated_by: "seed".to_string(),
                created: now,
                updated: now,
            },
        );
        id
    }

    /// Dashboards attributed to a plugin in an organization, without logging.
    pub fn dashboards(&self, org_id: i64, plugin_id: &str) -> Vec<StoredDashboard> {
        self.inner
            .lock()
            .rows
            .values()
            .filter(|d| d.org_id == org_id && d.plugin_id == plugin_id)
            .cloned()
            .collect()
    }

    /// Stored (slug, revision) pairs of a plugin, sorted by slug.
    pub fn revisions(&self, org_id: i64, plugin_id: &str) -> Vec<(String, i64)> {
        let mut revisions: Vec<(String, i64)> = self
            .dashboards(org_id, plugin_id)
            .into_iter()
            .map(|d| (d.slug.clone(), d.revision()))
            .collect();
        revisions.sort();
        revisions
    }

    pub fn get(&self, id: i64) -> Option<StoredDashboard> {
        self.inner.lock().rows.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().rows.is_empty()
    }

    /// Fail the `n`th import call.
    pub fn fail_import_at(&self, n: usize, failure: Failure) {
        self.inner.lock().imports.at = Some((n, failure));
    }

    /// Fail the `n`th delete call.
    pub fn fail_delete_at(&self, n: usize, failure: Failure) {
        self.inner.lock().deletes.at = Some((n, failure));
    }

    /// Fail every `list_by_plugin` call.
    pub fn fail_list(&self, failure: Failure) {
        self.inner.lock().lists.always = Some(failure);
    }

    /// Never complete the `n`th import call.
    pub fn hang_on_import(&self, n: usize) {
        self.inner.lock().imports.hang_at = Some(n);
    }

    /// Never complete the `n`th delete call.
    pub fn hang_on_delete(&self, n: usize) {
        self.inner.lock().deletes.hang_at = Some(n);
    }
}

#[async_trait]
impl DashboardImporter for InMemoryDashboardStore {
    async fn import_dashboard(&self, request: ImportDashboardRequest) -> SyncResult<i64> {
        self.log.record(Call::Import {
            org_id: request.org_id,
            plugin_id: request.plugin_id.clone(),
            reference: request.reference.clone(),
            overwrite: request.overwrite,
            principal: request.principal.to_string(),
        });

        let step = self.inner.lock().imports.next();
        apply(step, "import_dashboard").await?;

        let validated = validate_import(&request)?;

        let mut inner = self.inner.lock();
        let existing = inner
            .rows
            .values()
            .find(|d| d.org_id == request.org_id && d.slug == validated.slug)
            .map(|d| (d.id, d.plugin_id.clone()));

        let now = inner.tick();
        match existing {
            Some(_) if !request.overwrite => Err(SyncError::validation(format!(
                "a dashboard with slug '{}' already exists in org {}",
                validated.slug, request.org_id
            ))),
            Some((_, owner)) if !can_overwrite(&owner, &request.plugin_id) => {
                Err(slug_claimed_error(&validated.slug, request.org_id))
            }
            Some((id, _)) => {
                if let Some(row) = inner.rows.get_mut(&id) {
                    row.plugin_id = request.plugin_id.clone();
                    row.title = validated.title;
                    row.data = request.payload;
                    row.updated_by = request.principal.to_string();
                    row.updated = now;
                }
                Ok(id)
            }
            None => {
                inner.next_id += 1;
                let id = inner.next_id;
                inner.rows.insert(
                    id,
                    StoredDashboard {
                        id,
                        uid: Uuid::now_v7(),
                        org_id: request.org_id,
                        plugin_id: request.plugin_id.clone(),
                        title: validated.title,
                        slug: validated.slug,
                        data: request.payload,
                        updated_by: request.principal.to_string(),
                        created: now,
                        updated: now,
                    },
                );
                Ok(id)
            }
        }
    }
}

#[async_trait]
impl DashboardStore for InMemoryDashboardStore {
    async fn delete_dashboard(&self, dashboard_id: i64, org_id: i64) -> SyncResult<()> {
        self.log.record(Call::Delete {
            org_id,
            dashboard_id,
        });

        let step = self.inner.lock().deletes.next();
        apply(step, "delete_dashboard").await?;

        let mut inner = self.inner.lock();
        match inner.rows.get(&dashboard_id) {
            Some(row) if row.org_id == org_id => {
                inner.rows.remove(&dashboard_id);
                Ok(())
            }
            _ => Err(SyncError::not_found(
                "dashboard",
                format!("{org_id}/{dashboard_id}"),
            )),
        }
    }

    async fn list_by_plugin(
        &self,
        org_id: i64,
        plugin_id: &str,
    ) -> SyncResult<Vec<StoredDashboard>> {
        self.log.record(Call::ListByPlugin {
            org_id,
            plugin_id: plugin_id.to_string(),
        });

        let step = self.inner.lock().lists.next();
        apply(step, "list_by_plugin").await?;

        let mut dashboards = self.dashboards(org_id, plugin_id);
        dashboards.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(dashboards)
    }
}

// -------------------------------------------------------------------------
// Settings store
// -------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SettingRows {
    rows: BTreeMap<(i64, String), PluginSetting>,
    clock: i64,
    lists: Trigger,
    gets: Trigger,
    updates: Trigger,
    set_enabled: Trigger,
}

/// Plugin settings over an in-memory table.
#[derive(Debug)]
pub struct InMemorySettingsStore {
    log: CallLog,
    inner: Mutex<SettingRows>,
}

impl InMemorySettingsStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            inner: Mutex::new(SettingRows::default()),
        }
    }

    /// Insert or replace a setting directly, bypassing the call log.
    pub fn seed(&self, org_id: i64, plugin_id: &str, enabled: bool, plugin_version: &str) {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let now = inner.clock;
        inner.rows.insert(
            (org_id, plugin_id.to_string()),
            PluginSetting {
                org_id,
                plugin_id: plugin_id.to_string(),
                enabled,
                plugin_version: plugin_version.to_string(),
                created: now,
                updated: now,
            },
        );
    }

    pub fn setting(&self, org_id: i64, plugin_id: &str) -> Option<PluginSetting> {
        self.inner
            .lock()
            .rows
            .get(&(org_id, plugin_id.to_string()))
            .cloned()
    }

    /// Recorded plugin version, if the setting exists.
    pub fn version(&self, org_id: i64, plugin_id: &str) -> Option<String> {
        self.setting(org_id, plugin_id).map(|s| s.plugin_version)
    }

    /// Fail every `list_settings` call.
    pub fn fail_list(&self, failure: Failure) {
        self.inner.lock().lists.always = Some(failure);
    }

    /// Fail every `get_setting` call.
    pub fn fail_get(&self, failure: Failure) {
        self.inner.lock().gets.always = Some(failure);
    }

    /// Fail every `update_version` call.
    pub fn fail_update(&self, failure: Failure) {
        self.inner.lock().updates.always = Some(failure);
    }

    /// Fail every `set_enabled` call.
    pub fn fail_set_enabled(&self, failure: Failure) {
        self.inner.lock().set_enabled.always = Some(failure);
    }
}

#[async_trait]
impl PluginSettingsStore for InMemorySettingsStore {
    async fn list_settings(&self, org_id: Option<i64>) -> SyncResult<Vec<PluginSetting>> {
        self.log.record(Call::ListSettings { org_id });

        let step = self.inner.lock().lists.next();
        apply(step, "list_settings").await?;

        Ok(self
            .inner
            .lock()
            .rows
            .values()
            .filter(|s| org_id.is_none_or(|org| s.org_id == org))
            .cloned()
            .collect())
    }

    async fn get_setting(&self, org_id: i64, plugin_id: &str) -> SyncResult<PluginSetting> {
        self.log.record(Call::GetSetting {
            org_id,
            plugin_id: plugin_id.to_string(),
        });

        let step = self.inner.lock().gets.next();
        apply(step, "get_setting").await?;

        self.setting(org_id, plugin_id).ok_or_else(|| {
            SyncError::not_found("plugin setting", format!("{org_id}/{plugin_id}"))
        })
    }

    async fn update_version(
        &self,
        org_id: i64,
        plugin_id: &str,
        version: &str,
    ) -> SyncResult<()> {
        self.log.record(Call::UpdateVersion {
            org_id,
            plugin_id: plugin_id.to_string(),
            version: version.to_string(),
        });

        let step = self.inner.lock().updates.next();
        apply(step, "update_version").await?;

        let mut inner = self.inner.lock();
        inner.clock += 1;
        let now = inner.clock;
        match inner.rows.get_mut(&(org_id, plugin_id.to_string())) {
            Some(setting) => {
                setting.plugin_version = version.to_string();
                setting.updated = now;
                Ok(())
            }
            None => Err(SyncError::not_found(
                "plugin setting",
                format!("{org_id}/{plugin_id}"),
            )),
        }
    }

    async fn set_enabled(
        &self,
        org_id: i64,
        plugin_id: &str,
        enabled: bool,
    ) -> SyncResult<PluginSetting> {
        self.log.record(Call::SetEnabled {
            org_id,
            plugin_id: plugin_id.to_string(),
            enabled,
        });

        let step = self.inner.lock().set_enabled.next();
        apply(step, "set_enabled").await?;

        let mut inner = self.inner.lock();
        inner.clock += 1;
        let now = inner.clock;
        let setting = inner
            .rows
            .entry((org_id, plugin_id.to_string()))
            .or_insert_with(|| PluginSetting {
                org_id,
                plugin_id: plugin_id.to_string(),
                enabled,
                plugin_version: String::new(),
                created: now,
                updated: now,
            });
        setting.enabled = enabled;
        setting.updated = now;
        Ok(setting.clone())
    }
}

// -------------------------------------------------------------------------
// Catalog
// -------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CatalogState {
    /// Bundled dashboards per plugin, in manifest order.
    bundled: HashMap<String, Vec<(String, LoadedDashboard)>>,
    failing_plugins: HashMap<String, Failure>,
    failing_loads: HashMap<String, Failure>,
    hang_on_list: HashSet<String>,
}

/// Plugin dashboard catalog over in-memory bundles.
///
/// Records are derived from the bundles and the [`InMemoryDashboardStore`]
/// on every call, so they reflect the effects of earlier passes.
#[derive(Debug)]
pub struct FakeCatalog {
    log: CallLog,
    store: Arc<InMemoryDashboardStore>,
    inner: Mutex<CatalogState>,
}

impl FakeCatalog {
    pub fn new(store: Arc<InMemoryDashboardStore>, log: CallLog) -> Self {
        Self {
            log,
            store,
            inner: Mutex::new(CatalogState::default()),
        }
    }

    /// Replace a plugin's bundled dashboards. `(reference, title, revision)`.
    pub fn bundle(&self, plugin_id: &str, dashboards: &[(&str, &str, i64)]) {
        let loaded = dashboards
            .iter()
            .map(|(reference, title, revision)| {
                let data = dashboard_payload(title, *revision);
                (
                    (*reference).to_string(),
                    LoadedDashboard {
                        title: (*title).to_string(),
                        slug: slugify(title),
                        revision: payload_revision(&data),
                        data,
                    },
                )
            })
            .collect();
        self.inner
            .lock()
            .bundled
            .insert(plugin_id.to_string(), loaded);
    }

    /// Forget a plugin entirely.
    pub fn remove_plugin(&self, plugin_id: &str) {
        self.inner.lock().bundled.remove(plugin_id);
    }

    /// Fail listing for one plugin.
    pub fn fail_list_for(&self, plugin_id: &str, failure: Failure) {
        self.inner
            .lock()
            .failing_plugins
            .insert(plugin_id.to_string(), failure);
    }

    /// Fail loading one dashboard reference.
    pub fn fail_load(&self, reference: &str, failure: Failure) {
        self.inner
            .lock()
            .failing_loads
            .insert(reference.to_string(), failure);
    }

    /// Never complete listing for one plugin.
    pub fn hang_on_list(&self, plugin_id: &str) {
        self.inner.lock().hang_on_list.insert(plugin_id.to_string());
    }
}

#[async_trait]
impl PluginDashboardCatalog for FakeCatalog {
    async fn list_plugin_dashboards(
        &self,
        org_id: i64,
        plugin_id: &str,
    ) -> SyncResult<Vec<PluginDashboardRecord>> {
        self.log.record(Call::ListPluginDashboards {
            org_id,
            plugin_id: plugin_id.to_string(),
        });

        let (step, bundled) = {
            let inner = self.inner.lock();
            let step = if inner.hang_on_list.contains(plugin_id) {
                Step::Hang
            } else if let Some(failure) = inner.failing_plugins.get(plugin_id) {
                Step::Fail(*failure)
            } else {
                Step::Proceed
            };
            (step, inner.bundled.get(plugin_id).cloned())
        };
        apply(step, "list_plugin_dashboards").await?;

        let bundled = bundled.ok_or_else(|| SyncError::not_found("plugin", plugin_id))?;
        let stored = self.store.dashboards(org_id, plugin_id);
        Ok(diff_plugin_dashboards(org_id, plugin_id, bundled, &stored))
    }

    async fn load_plugin_dashboard(
        &self,
        plugin_id: &str,
        reference: &str,
    ) -> SyncResult<LoadedDashboard> {
        self.log.record(Call::LoadPluginDashboard {
            plugin_id: plugin_id.to_string(),
            reference: reference.to_string(),
        });

        let (step, loaded) = {
            let inner = self.inner.lock();
            let step = match inner.failing_loads.get(reference) {
                Some(failure) => Step::Fail(*failure),
                None => Step::Proceed,
            };
            let loaded = inner.bundled.get(plugin_id).and_then(|dashboards| {
                dashboards
                    .iter()
                    .find(|(r, _)| r == reference)
                    .map(|(_, d)| d.clone())
            });
            (step, loaded)
        };
        apply(step, "load_plugin_dashboard").await?;

        loaded.ok_or_else(|| {
            SyncError::not_found("plugin dashboard", format!("{plugin_id}/{reference}"))
        })
    }
}

// -------------------------------------------------------------------------
// Fixtures
// -------------------------------------------------------------------------

/// Minimal dashboard payload with a title and revision.
pub fn dashboard_payload(title: &str, revision: i64) -> JsonValue {
    json!({
        "title": title,
        "revision": revision,
        "panels": [],
    })
}

/// Plugin descriptor with dashboard includes named after their references.
pub fn plugin(id: &str, version: &str, references: &[&str]) -> PluginDescriptor {
    let mut descriptor = PluginDescriptor::new(id, version);
    descriptor.dashboards = references
        .iter()
        .map(|r| DashboardInclude {
            name: (*r).to_string(),
            reference: (*r).to_string(),
        })
        .collect();
    descriptor
}

/// Every fake wired to one call log, ready to build a reconciler.
#[derive(Debug)]
pub struct Harness {
    pub log: CallLog,
    pub plugins: Arc<FakePluginRegistry>,
    pub dashboards: Arc<InMemoryDashboardStore>,
    pub catalog: Arc<FakeCatalog>,
    pub settings: Arc<InMemorySettingsStore>,
    pub metrics: Arc<Metrics>,
}

impl Harness {
    pub fn new() -> Self {
        let log = CallLog::new();
        let dashboards = Arc::new(InMemoryDashboardStore::new(log.clone()));
        Self {
            plugins: Arc::new(FakePluginRegistry::new()),
            catalog: Arc::new(FakeCatalog::new(dashboards.clone(), log.clone())),
            settings: Arc::new(InMemorySettingsStore::new(log.clone())),
            metrics: Arc::new(Metrics::new()),
            dashboards,
            log,
        }
    }

    /// Collaborators for a reconciler.
    pub fn deps(&self) -> ReconcilerDeps {
        ReconcilerDeps {
            plugins: self.plugins.clone(),
            catalog: self.catalog.clone(),
            importer: self.dashboards.clone(),
            dashboards: self.dashboards.clone(),
            settings: self.settings.clone(),
        }
    }

    pub fn reconciler(&self) -> DashboardReconciler {
        DashboardReconciler::new(self.deps(), self.metrics.clone())
    }

    /// Install (or upgrade) a plugin in both the registry and the catalog.
    /// `(reference, title, revision)` per bundled dashboard.
    pub fn install_plugin(
        &self,
        id: &str,
        version: &str,
        dashboards: &[(&str, &str, i64)],
    ) -> PluginDescriptor {
        let references: Vec<&str> = dashboards.iter().map(|(r, _, _)| *r).collect();
        let descriptor = plugin(id, version, &references);
        self.plugins.install(descriptor.clone());
        self.catalog.bundle(id, dashboards);
        descriptor
    }

    /// Descriptor of an installed plugin. Panics if it is not installed.
    pub fn descriptor(&self, id: &str) -> PluginDescriptor {
        self.plugins
            .plugin(id)
            .unwrap_or_else(|| panic!("plugin '{id}' is not installed"))
    }

    /// Remove a plugin from the registry and the catalog.
    pub fn uninstall_plugin(&self, id: &str) {
        self.plugins.uninstall(id);
        self.catalog.remove_plugin(id);
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
