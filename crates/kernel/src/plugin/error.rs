//! Plugin discovery error types with clear, actionable messages.

use thiserror::Error;

/// Errors that can occur while discovering plugins on disk.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Plugin directory is missing the .info.toml manifest file.
    #[error("plugin '{plugin}': no .info.toml manifest found in {path}")]
    MissingManifest { plugin: String, path: String },

    /// Multiple .info.toml files found in plugin directory.
    #[error("plugin directory '{path}': multiple .info.toml files found, expected exactly one")]
    MultipleManifests { path: String },

    /// The .info.toml file could not be read or parsed.
    #[error("plugin '{plugin}': failed to parse manifest: {details}")]
    InvalidManifest { plugin: String, details: String },

    /// The manifest file name does not match the plugin name it declares.
    #[error("plugin '{plugin}': manifest '{file}' must be named '{expected}'")]
    ManifestNameMismatch {
        plugin: String,
        file: String,
        expected: String,
    },

    /// The directory could not be listed.
    #[error("plugin directory '{path}': {details}")]
    Unreadable { path: String, details: String },
}

impl PluginError {
    /// Create a missing manifest error.
    pub fn missing_manifest(path: impl Into<String>) -> Self {
        let path = path.into();
        let plugin = plugin_from_path(&path);
        Self::MissingManifest { plugin, path }
    }

    /// Create an invalid manifest error, naming the plugin after its directory.
    pub fn invalid_manifest(path: impl Into<String>, details: &anyhow::Error) -> Self {
        Self::InvalidManifest {
            plugin: plugin_from_path(&path.into()),
            details: format!("{details:#}"),
        }
    }
}

fn plugin_from_path(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifest_names_plugin_directory() {
        let err = PluginError::missing_manifest("/plugins/nginx-app");
        let msg = err.to_string();
        assert!(msg.contains("'nginx-app'"));
        assert!(msg.contains("/plugins/nginx-app"));
    }

    #[test]
    fn name_mismatch_names_expected_file() {
        let err = PluginError::ManifestNameMismatch {
            plugin: "nginx-app".to_string(),
            file: "nginx.info.toml".to_string(),
            expected: "nginx-app.info.toml".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "plugin 'nginx-app': manifest 'nginx.info.toml' must be named 'nginx-app.info.toml'"
        );
    }

    #[test]
    fn invalid_manifest_keeps_cause_chain() {
        let cause = anyhow::anyhow!("expected `=`").context("failed to parse plugin info TOML");
        let err = PluginError::invalid_manifest("/plugins/broken", &cause);
        let msg = err.to_string();
        assert!(msg.contains("'broken'"));
        assert!(msg.contains("expected `=`"));
    }
}
