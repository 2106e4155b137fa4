//! Plugin registry - indexes installed plugins by identifier.
//!
//! The registry is built once from the plugins directory. Each plugin lives
//! in its own subdirectory with exactly one `{name}.info.toml` manifest.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::error::PluginError;
use super::info_parser::PluginInfo;

/// Read-only view of an installed plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    /// Plugin identifier.
    pub id: String,
    /// Currently installed version.
    pub version: String,
    /// Dashboards bundled with this version, in manifest order.
    pub dashboards: Vec<DashboardInclude>,
}

/// A dashboard bundled with a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardInclude {
    /// Display name from the manifest.
    pub name: String,
    /// Path of the dashboard JSON relative to the plugin directory.
    pub reference: String,
}

impl PluginDescriptor {
    /// Create a descriptor with no bundled dashboards.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            dashboards: Vec::new(),
        }
    }
}

/// Lookup of installed plugins by identifier.
pub trait PluginLookup: Send + Sync {
    /// Find an installed plugin. Returns None once a plugin is uninstalled.
    fn plugin(&self, plugin_id: &str) -> Option<PluginDescriptor>;
}

#[derive(Debug)]
struct RegisteredPlugin {
    info: PluginInfo,
    dir: PathBuf,
}

/// Registry of plugins discovered on disk.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, RegisteredPlugin>,
}

impl PluginRegistry {
    /// Discover all plugins under `plugins_dir`.
    ///
    /// Plugins with missing or broken manifests are logged and skipped so
    /// one bad plugin cannot hide the others.
    pub fn discover(plugins_dir: &Path) -> Self {
        let mut registry = Self::default();

        if !plugins_dir.exists() {
            info!(
                ?plugins_dir,
                "plugins directory does not exist, nothing to discover"
            );
            return registry;
        }

        let entries = match std::fs::read_dir(plugins_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to read plugins directory");
                return registry;
            }
        };

        let mut dirs: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();

        dirs.sort();

        for dir in dirs {
            match Self::load_plugin(&dir) {
                Ok(info) => registry.insert(info, dir),
                Err(e) => warn!(dir = %dir.display(), error = %e, "skipping plugin"),
            }
        }

        info!(plugins = registry.len(), "plugin discovery complete");
        registry
    }

    /// Parse the manifest of a single plugin directory.
    ///
    /// The manifest must be named `{name}.info.toml` after the plugin it declares.
    pub fn load_plugin(plugin_dir: &Path) -> Result<PluginInfo, PluginError> {
        let display = plugin_dir.display().to_string();

        let info_files: Vec<PathBuf> = std::fs::read_dir(plugin_dir)
            .map_err(|e| PluginError::Unreadable {
                path: display.clone(),
                details: e.to_string(),
            })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".info.toml"))
            })
            .collect();

        let info_path = match info_files.as_slice() {
            [] => return Err(PluginError::missing_manifest(display)),
            [path] => path,
            _ => return Err(PluginError::MultipleManifests { path: display }),
        };

        let info =
            PluginInfo::parse(info_path).map_err(|e| PluginError::invalid_manifest(display, &e))?;

        let expected = format!("{}.info.toml", info.name);
        let file = info_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if file != expected {
            return Err(PluginError::ManifestNameMismatch {
                plugin: info.name.clone(),
                file: file.to_string(),
                expected,
            });
        }

        Ok(info)
    }

    /// Register a parsed plugin located at `dir`.
    pub fn insert(&mut self, info: PluginInfo, dir: PathBuf) {
        if let Some(previous) = self.plugins.get(&info.name) {
            warn!(
                plugin = %info.name,
                previous = %previous.dir.display(),
                replacement = %dir.display(),
                "duplicate plugin id, keeping the last one"
            );
        }
        self.plugins
            .insert(info.name.clone(), RegisteredPlugin { info, dir });
    }

    /// Directory a plugin was loaded from.
    pub fn plugin_dir(&self, plugin_id: &str) -> Option<&Path> {
        self.plugins.get(plugin_id).map(|p| p.dir.as_path())
    }

    /// Parsed manifest of a plugin.
    pub fn info(&self, plugin_id: &str) -> Option<&PluginInfo> {
        self.plugins.get(plugin_id).map(|p| &p.info)
    }

    /// Identifiers of all registered plugins, sorted.
    pub fn plugin_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// True if no plugins are registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl PluginLookup for PluginRegistry {
    fn plugin(&self, plugin_id: &str) -> Option<PluginDescriptor> {
        let info = &self.plugins.get(plugin_id)?.info;

        Some(PluginDescriptor {
            id: info.name.clone(),
            version: info.version.clone(),
            dashboards: info
                .dashboards()
                .map(|d| DashboardInclude {
                    name: d.name.clone(),
                    reference: d.path.clone(),
                })
                .collect(),
        })
    }
}
