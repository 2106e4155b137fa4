#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for plugin discovery and the bundled dashboard catalog.
//!
//! Plugins are written to a temporary directory, discovered with
//! [`PluginRegistry::discover`], and compared against the in-memory
//! dashboard store.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use plugdash_kernel::catalog::{BundledDashboardCatalog, PluginDashboardCatalog};
use plugdash_kernel::error::SyncError;
use plugdash_kernel::plugin::{PluginLookup, PluginRegistry};
use plugdash_kernel::reconciler::DashboardReconciler;
use plugdash_kernel::reconciler::ReconcilerDeps;
use plugdash_test_utils::{CallLog, Failure, InMemoryDashboardStore, InMemorySettingsStore};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const NGINX_MANIFEST: &str = r#"
name = "nginx-app"
description = "Nginx monitoring"
version = "1.2.0"

[[includes]]
type = "dashboard"
name = "Overview"
path = "dashboards/overview.json"

[[includes]]
type = "page"
name = "Docs"
path = "pages/docs.md"

[[includes]]
type = "dashboard"
name = "Errors"
path = "dashboards/errors.json"
"#;

const DUPLICATE_MANIFEST: &str = r#"
name = "dupe-app"
version = "2.0.0"

[[includes]]
type = "dashboard"
name = "Overview"
path = "dashboards/a.json"

[[includes]]
type = "dashboard"
name = "Overview again"
path = "dashboards/b.json"
"#;

fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Plugins directory with a valid nginx-app and a plugin with no manifest.
fn plugins_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let nginx = dir.path().join("nginx-app");
    write_file(&nginx.join("nginx-app.info.toml"), NGINX_MANIFEST);
    write_file(
        &nginx.join("dashboards/overview.json"),
        r#"{"title": "Nginx Overview", "revision": 4, "panels": []}"#,
    );
    write_file(
        &nginx.join("dashboards/errors.json"),
        r#"{"title": "Nginx Errors", "panels": []}"#,
    );
    fs::create_dir_all(dir.path().join("empty-dir")).unwrap();

    let dupe = dir.path().join("dupe-app");
    write_file(&dupe.join("dupe-app.info.toml"), DUPLICATE_MANIFEST);
    write_file(
        &dupe.join("dashboards/a.json"),
        r#"{"title": "Nginx Overview", "revision": 2}"#,
    );
    write_file(
        &dupe.join("dashboards/b.json"),
        r#"{"title": "nginx overview!", "revision": 5}"#,
    );

    // Manifest named after a different plugin.
    write_file(
        &dir.path().join("misnamed-app/other-app.info.toml"),
        "name = \"misnamed-app\"\nversion = \"1.0.0\"\n",
    );
    dir
}

struct Fixture {
    dir: TempDir,
    registry: Arc<PluginRegistry>,
    store: Arc<InMemoryDashboardStore>,
    catalog: BundledDashboardCatalog,
}

impl Fixture {
    fn reconciler(&self, settings: Arc<InMemorySettingsStore>) -> DashboardReconciler {
        DashboardReconciler::new(
            ReconcilerDeps {
                plugins: self.registry.clone(),
                catalog: Arc::new(BundledDashboardCatalog::new(
                    self.registry.clone(),
                    self.store.clone(),
                )),
                importer: self.store.clone(),
                dashboards: self.store.clone(),
                settings,
            },
            Arc::new(plugdash_kernel::metrics::Metrics::new()),
        )
    }
}

fn fixture() -> Fixture {
    let dir = plugins_dir();
    let registry = Arc::new(PluginRegistry::discover(dir.path()));
    let store = Arc::new(InMemoryDashboardStore::new(CallLog::new()));
    let catalog = BundledDashboardCatalog::new(registry.clone(), store.clone());
    Fixture {
        dir,
        registry,
        store,
        catalog,
    }
}

#[test]
fn discovery_skips_directories_without_manifest() {
    let f = fixture();
    assert_eq!(f.registry.plugin_ids(), vec!["dupe-app", "nginx-app"]);

    let plugin = f.registry.plugin("nginx-app").unwrap();
    assert_eq!(plugin.version, "1.2.0");
    let references: Vec<&str> = plugin
        .dashboards
        .iter()
        .map(|d| d.reference.as_str())
        .collect();
    assert_eq!(
        references,
        vec!["dashboards/overview.json", "dashboards/errors.json"]
    );
}

#[test]
fn discovery_skips_manifest_named_after_another_plugin() {
    let f = fixture();
    assert!(f.registry.plugin("misnamed-app").is_none());

    let err = PluginRegistry::load_plugin(&f.dir.path().join("misnamed-app")).unwrap_err();
    assert!(err.to_string().contains("other-app.info.toml"));
}

#[test]
fn discovery_of_missing_directory_is_empty() {
    let dir = TempDir::new().unwrap();
    let registry = PluginRegistry::discover(&dir.path().join("nope"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn lists_bundled_dashboards_against_empty_store() {
    let f = fixture();

    let records = f.catalog.list_plugin_dashboards(1, "nginx-app").await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].slug, "nginx-overview");
    assert_eq!(records[0].revision, 4);
    assert!(!records[0].imported);
    assert_eq!(records[0].imported_revision, 0);
    // No revision in the payload means revision 1.
    assert_eq!(records[1].slug, "nginx-errors");
    assert_eq!(records[1].revision, 1);
}

#[tokio::test]
async fn stored_dashboards_match_by_slug_and_leftovers_are_removed() {
    let f = fixture();
    let overview = f.store.seed(1, "nginx-app", "Nginx Overview", 2);
    let legacy = f.store.seed(1, "nginx-app", "Nginx Legacy", 1);

    let records = f.catalog.list_plugin_dashboards(1, "nginx-app").await.unwrap();

    assert_eq!(records.len(), 3);
    let overview_record = records.iter().find(|r| r.slug == "nginx-overview").unwrap();
    assert_eq!(overview_record.dashboard_id, Some(overview));
    assert_eq!(overview_record.imported_revision, 2);
    assert!(overview_record.is_outdated());

    let removed = records.iter().find(|r| r.removed).unwrap();
    assert_eq!(removed.dashboard_id, Some(legacy));
    assert_eq!(removed.slug, "nginx-legacy");
}

#[tokio::test]
async fn unknown_plugin_is_not_found() {
    let f = fixture();
    let err = f
        .catalog
        .list_plugin_dashboards(1, "ghost-app")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn store_failure_surfaces_as_catalog_unavailable() {
    let f = fixture();
    f.store.fail_list(Failure::StoreUnavailable);

    let err = f
        .catalog
        .list_plugin_dashboards(1, "nginx-app")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::CatalogUnavailable(_)));
}

#[tokio::test]
async fn load_rejects_missing_escaping_and_malformed_files() {
    let f = fixture();
    let nginx_dir = f.registry.plugin_dir("nginx-app").unwrap().to_path_buf();

    let missing = f
        .catalog
        .load_plugin_dashboard("nginx-app", "dashboards/missing.json")
        .await
        .unwrap_err();
    assert!(missing.is_not_found());

    let escaping = f
        .catalog
        .load_plugin_dashboard("nginx-app", "../other/secret.json")
        .await
        .unwrap_err();
    assert!(escaping.is_not_found());

    write_file(&nginx_dir.join("dashboards/broken.json"), "{ not json");
    let malformed = f
        .catalog
        .load_plugin_dashboard("nginx-app", "dashboards/broken.json")
        .await
        .unwrap_err();
    assert!(matches!(malformed, SyncError::Validation(_)));

    write_file(&nginx_dir.join("dashboards/list.json"), "[1, 2]");
    let not_object = f
        .catalog
        .load_plugin_dashboard("nginx-app", "dashboards/list.json")
        .await
        .unwrap_err();
    assert!(matches!(not_object, SyncError::Validation(_)));
}

#[tokio::test]
async fn load_returns_payload_with_title_slug_and_revision() {
    let f = fixture();

    let loaded = f
        .catalog
        .load_plugin_dashboard("nginx-app", "dashboards/overview.json")
        .await
        .unwrap();

    assert_eq!(loaded.title, "Nginx Overview");
    assert_eq!(loaded.slug, "nginx-overview");
    assert_eq!(loaded.revision, 4);
    assert!(loaded.data["panels"].is_array());
}

#[tokio::test]
async fn reconciler_syncs_bundled_dashboards_from_disk() {
    let f = fixture();
    let log = CallLog::new();
    let settings = Arc::new(InMemorySettingsStore::new(log));
    settings.seed(1, "nginx-app", true, "1.1.0");
    let catalog = Arc::new(BundledDashboardCatalog::new(
        f.registry.clone(),
        f.store.clone(),
    ));

    let reconciler = f.reconciler(settings.clone());

    let report = reconciler.reconcile_all(&CancellationToken::new()).await;
    assert_eq!(report.synced, 1);
    assert_eq!(
        f.store.revisions(1, "nginx-app"),
        vec![
            ("nginx-errors".to_string(), 1),
            ("nginx-overview".to_string(), 4)
        ]
    );
    assert_eq!(settings.version(1, "nginx-app").as_deref(), Some("1.2.0"));

    let records = catalog.list_plugin_dashboards(1, "nginx-app").await.unwrap();
    assert!(records.iter().all(|r| !r.is_outdated() && !r.removed));
}

#[tokio::test]
async fn colliding_dashboard_slugs_are_rejected() {
    let f = fixture();

    let err = f
        .catalog
        .list_plugin_dashboards(1, "dupe-app")
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Validation(_)));
    assert!(err.to_string().contains("nginx-overview"));
}

#[tokio::test]
async fn sync_pass_with_colliding_slugs_writes_nothing_and_keeps_version() {
    let f = fixture();
    let settings = Arc::new(InMemorySettingsStore::new(CallLog::new()));
    settings.seed(1, "dupe-app", true, "1.0.0");
    let reconciler = f.reconciler(settings.clone());
    let plugin = f.registry.plugin("dupe-app").unwrap();
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let err = reconciler
            .sync_plugin_dashboards(1, &plugin, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    assert!(f.store.is_empty());
    assert_eq!(settings.version(1, "dupe-app").as_deref(), Some("1.0.0"));
}
