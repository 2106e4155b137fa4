//! Application state shared by the server, the CLI, and route handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use redis::Client as RedisClient;
use sqlx::PgPool;
use tracing::info;

use crate::catalog::{BundledDashboardCatalog, PluginDashboardCatalog};
use crate::config::Config;
use crate::db;
use crate::metrics::Metrics;
use crate::plugin::PluginRegistry;
use crate::reconciler::{DashboardReconciler, ReconcilerDeps};
use crate::store::{DashboardStore, PgDashboardStore, PgPluginSettingsStore, PluginSettingsStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Redis client for plugin state notifications.
    redis: RedisClient,

    /// Installed plugins, discovered once at startup.
    registry: Arc<PluginRegistry>,

    settings: Arc<dyn PluginSettingsStore>,

    catalog: Arc<dyn PluginDashboardCatalog>,

    reconciler: Arc<DashboardReconciler>,

    metrics: Arc<Metrics>,
}

impl AppState {
    /// Connect to the backing services, apply the schema, and wire the
    /// reconciler over the discovered plugins.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::ensure_schema(&db)
            .await
            .context("failed to prepare database schema")?;

        let redis =
            RedisClient::open(config.redis_url.as_str()).context("invalid REDIS_URL")?;

        let registry = Arc::new(PluginRegistry::discover(&config.plugins_dir));
        info!(
            plugins = registry.len(),
            dir = %config.plugins_dir.display(),
            "plugins discovered"
        );

        let dashboards = Arc::new(PgDashboardStore::new(db.clone()));
        let settings: Arc<dyn PluginSettingsStore> =
            Arc::new(PgPluginSettingsStore::new(db.clone()));
        let catalog: Arc<dyn PluginDashboardCatalog> = Arc::new(BundledDashboardCatalog::new(
            registry.clone(),
            dashboards.clone() as Arc<dyn DashboardStore>,
        ));

        let metrics = Arc::new(Metrics::new());

        let reconciler = Arc::new(DashboardReconciler::new(
            ReconcilerDeps {
                plugins: registry.clone(),
                catalog: catalog.clone(),
                importer: dashboards.clone(),
                dashboards,
                settings: settings.clone(),
            },
            metrics.clone(),
        ));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                db,
                redis,
                registry,
                settings,
                catalog,
                reconciler,
                metrics,
            }),
        })
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get the Redis client.
    pub fn redis(&self) -> &RedisClient {
        &self.inner.redis
    }

    /// Get the plugin registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.inner.registry
    }

    /// Get the plugin settings store.
    pub fn settings(&self) -> &Arc<dyn PluginSettingsStore> {
        &self.inner.settings
    }

    /// Get the plugin dashboard catalog.
    pub fn catalog(&self) -> &Arc<dyn PluginDashboardCatalog> {
        &self.inner.catalog
    }

    /// Get the dashboard reconciler.
    pub fn reconciler(&self) -> &Arc<DashboardReconciler> {
        &self.inner.reconciler
    }

    /// Get the metrics registry.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    /// Check if PostgreSQL is healthy.
    pub async fn postgres_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }

    /// Check if Redis is healthy.
    pub async fn redis_healthy(&self) -> bool {
        let Ok(mut conn) = self.inner.redis.get_multiplexed_async_connection().await else {
            return false;
        };

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("plugins", &self.inner.registry.len())
            .finish()
    }
}
