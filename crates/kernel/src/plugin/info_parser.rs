//! Parser for plugin `.info.toml` manifest files.
//!
//! Each plugin has a `{name}.info.toml` file that declares metadata:
//! - name, version, description
//! - includes (bundled resources, most importantly dashboards)

use std::path::{Component, Path};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{MAX_PLUGIN_ID_LENGTH, MAX_VERSION_LENGTH};

/// Plugin metadata parsed from `.info.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginInfo {
    /// Plugin identifier (must match the manifest file name).
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Plugin version (e.g., "1.0.0").
    pub version: String,

    /// Resources bundled with the plugin.
    #[serde(default)]
    pub includes: Vec<PluginInclude>,
}

/// A resource bundled with a plugin.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginInclude {
    /// Resource type, one of [`KNOWN_INCLUDE_TYPES`].
    #[serde(rename = "type")]
    pub kind: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Path relative to the plugin directory.
    #[serde(default)]
    pub path: String,
}

/// Include type for bundled dashboards.
pub const INCLUDE_DASHBOARD: &str = "dashboard";

/// Known include types for validation.
pub const KNOWN_INCLUDE_TYPES: &[&str] = &[INCLUDE_DASHBOARD, "page", "panel", "datasource"];

impl PluginInclude {
    /// True if this include is a bundled dashboard.
    pub fn is_dashboard(&self) -> bool {
        self.kind == INCLUDE_DASHBOARD
    }
}

impl PluginInfo {
    /// Parse a plugin info file from the given path.
    pub fn parse(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read plugin info file: {}", path.display()))?;

        Self::parse_str(&content, path)
    }

    /// Parse plugin info from a TOML string.
    pub fn parse_str(content: &str, path: &Path) -> Result<Self> {
        let info: PluginInfo = toml::from_str(content)
            .with_context(|| format!("failed to parse plugin info TOML at {}", path.display()))?;

        info.validate(path)?;
        Ok(info)
    }

    /// Bundled dashboards, in manifest order.
    pub fn dashboards(&self) -> impl Iterator<Item = &PluginInclude> {
        self.includes.iter().filter(|i| i.is_dashboard())
    }

    /// Validate the parsed plugin info.
    fn validate(&self, path: &Path) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("plugin info at {} has empty 'name' field", path.display());
        }

        if self.name.chars().count() > MAX_PLUGIN_ID_LENGTH {
            anyhow::bail!(
                "plugin info at {} has a 'name' longer than {MAX_PLUGIN_ID_LENGTH} characters",
                path.display()
            );
        }

        if self.version.is_empty() {
            anyhow::bail!(
                "plugin '{}' at {} has empty 'version' field",
                self.name,
                path.display()
            );
        }

        if self.version.chars().count() > MAX_VERSION_LENGTH {
            anyhow::bail!(
                "plugin '{}' at {} has a 'version' longer than {MAX_VERSION_LENGTH} characters",
                self.name,
                path.display()
            );
        }

        for include in &self.includes {
            if !KNOWN_INCLUDE_TYPES.contains(&include.kind.as_str()) {
                anyhow::bail!(
                    "plugin '{}' declares unknown include type '{}'. Known types: {}",
                    self.name,
                    include.kind,
                    KNOWN_INCLUDE_TYPES.join(", ")
                );
            }

            if include.is_dashboard() && !is_contained_path(&include.path) {
                anyhow::bail!(
                    "plugin '{}' dashboard '{}' has invalid path '{}': must be relative and stay inside the plugin directory",
                    self.name,
                    include.name,
                    include.path
                );
            }
        }

        Ok(())
    }
}

/// True if `reference` is a non-empty relative path without `..` segments.
pub fn is_contained_path(reference: &str) -> bool {
    let path = Path::new(reference);
    !reference.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_info() {
        let toml = r#"
name = "nginx-app"
description = "Dashboards for nginx"
version = "1.2.0"

[[includes]]
type = "dashboard"
name = "Nginx Overview"
path = "dashboards/overview.json"

[[includes]]
type = "page"
name = "Config"
"#;

        let info = PluginInfo::parse_str(toml, Path::new("test.toml")).unwrap();
        assert_eq!(info.name, "nginx-app");
        assert_eq!(info.version, "1.2.0");
        assert_eq!(info.includes.len(), 2);

        let dashboards: Vec<_> = info.dashboards().collect();
        assert_eq!(dashboards.len(), 1);
        assert_eq!(dashboards[0].path, "dashboards/overview.json");
    }

    #[test]
    fn parse_minimal_info() {
        let toml = r#"
name = "minimal"
version = "0.1.0"
"#;

        let info = PluginInfo::parse_str(toml, Path::new("test.toml")).unwrap();
        assert_eq!(info.name, "minimal");
        assert!(info.description.is_empty());
        assert_eq!(info.dashboards().count(), 0);
    }

    #[test]
    fn reject_unknown_include_type() {
        let toml = r#"
name = "bad"
version = "1.0.0"

[[includes]]
type = "widget"
"#;

        let result = PluginInfo::parse_str(toml, Path::new("test.toml"));
        assert!(result.unwrap_err().to_string().contains("unknown include type"));
    }

    #[test]
    fn reject_escaping_dashboard_path() {
        let toml = r#"
name = "bad"
version = "1.0.0"

[[includes]]
type = "dashboard"
name = "Sneaky"
path = "../../etc/passwd"
"#;

        let result = PluginInfo::parse_str(toml, Path::new("test.toml"));
        assert!(result.unwrap_err().to_string().contains("invalid path"));
    }

    #[test]
    fn reject_empty_name() {
        let toml = r#"
name = ""
version = "1.0.0"
"#;

        let result = PluginInfo::parse_str(toml, Path::new("test.toml"));
        assert!(result.unwrap_err().to_string().contains("empty 'name'"));
    }

    #[test]
    fn reject_empty_version() {
        let toml = r#"
name = "test"
version = ""
"#;

        let result = PluginInfo::parse_str(toml, Path::new("test.toml"));
        assert!(result.unwrap_err().to_string().contains("empty 'version'"));
    }

    #[test]
    fn reject_overlong_version() {
        let toml = format!(
            "name = \"test\"\nversion = \"1.0.0-{}\"\n",
            "x".repeat(MAX_VERSION_LENGTH)
        );

        let result = PluginInfo::parse_str(&toml, Path::new("test.toml"));
        assert!(result.unwrap_err().to_string().contains("'version' longer than 50"));
    }

    #[test]
    fn reject_overlong_name() {
        let toml = format!(
            "name = \"{}\"\nversion = \"1.0.0\"\n",
            "n".repeat(MAX_PLUGIN_ID_LENGTH + 1)
        );

        let result = PluginInfo::parse_str(&toml, Path::new("test.toml"));
        assert!(result.unwrap_err().to_string().contains("'name' longer than 190"));
    }

    #[test]
    fn contained_paths() {
        assert!(is_contained_path("dashboards/a.json"));
        assert!(is_contained_path("./a.json"));
        assert!(!is_contained_path(""));
        assert!(!is_contained_path("/abs/a.json"));
        assert!(!is_contained_path("dashboards/../../a.json"));
    }
}
