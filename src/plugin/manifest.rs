use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::plugin::error::{PluginError, PluginResult};

pub const MANIFEST_FILENAME: &str = "manifest.json";
pub const DEFAULT_ENTRY: &str = "plugin.wasm";
const DEFAULT_VERSION: &str = "0.0.0";

/// The `manifest.json` record stored at the root of every installed plugin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Code module, relative to the plugin directory.
    #[serde(default)]
    pub entry: Option<String>,
}

impl PluginManifest {
    pub fn path_in(plugin_dir: &Path) -> PathBuf {
        plugin_dir.join(MANIFEST_FILENAME)
    }

    pub fn exists_in(plugin_dir: &Path) -> bool {
        Self::path_in(plugin_dir).is_file()
    }

    pub fn load(plugin_dir: &Path) -> PluginResult<Self> {
        let manifest_path = Self::path_in(plugin_dir);
        let raw = fs::read_to_string(&manifest_path).map_err(PluginError::io(&manifest_path))?;

        serde_json::from_str(&raw).map_err(|err| PluginError::InvalidPlugin {
            path: manifest_path,
            reason: err.to_string(),
        })
    }

    pub fn entry_path(&self, plugin_dir: &Path) -> PathBuf {
        plugin_dir.join(self.entry.as_deref().unwrap_or(DEFAULT_ENTRY))
    }

    /// Resolve metadata for the plugin installed at `plugin_dir`, applying
    /// defaults for absent fields.
    pub fn into_metadata(self, plugin_dir: &Path) -> PluginMetadata {
        let dir_name = plugin_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        PluginMetadata {
            name: self.name.unwrap_or(dir_name),
            version: self.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            description: self.description.unwrap_or_default(),
            path: plugin_dir.to_path_buf(),
        }
    }
}

/// Metadata describing an installed plugin. Rebuilt from the manifest on
/// every listing; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub path: PathBuf,
}
