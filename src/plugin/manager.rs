use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::model::catalogue::{Catalogue, CatalogueEntry};
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::installer::{InstallLock, PluginInstaller, PluginSource};
use crate::plugin::manifest::{PluginManifest, PluginMetadata};
use crate::plugin::runtime::{self, ModuleLoader, ResolvablePaths};

/// Owns the catalogue and the install root, and runs the plugin lifecycle.
///
/// The install root is the only record of what is installed: one directory
/// per plugin, each holding a `manifest.json`. Install and uninstall hold an
/// advisory lock on the root; concurrent processes are otherwise unsupported.
pub struct PluginManager {
    install_dir: PathBuf,
    catalogue: Catalogue,
    loader: Box<dyn ModuleLoader>,
    resolvable: ResolvablePaths,
}

impl PluginManager {
    /// Create the install root if needed and load the catalogue.
    pub fn new(install_dir: PathBuf, catalogue_path: &Path) -> PluginResult<Self> {
        fs::create_dir_all(&install_dir).map_err(PluginError::io(&install_dir))?;

        Ok(Self {
            install_dir,
            catalogue: Catalogue::load(catalogue_path),
            loader: runtime::default_loader(),
            resolvable: ResolvablePaths::default(),
        })
    }

    pub fn with_loader(mut self, loader: Box<dyn ModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    #[cfg(test)]
    pub fn resolvable(&self) -> &ResolvablePaths {
        &self.resolvable
    }

    pub fn list_available(&self) -> &[CatalogueEntry] {
        self.catalogue.entries()
    }

    pub fn search(&self, keyword: &str) -> Vec<&CatalogueEntry> {
        self.catalogue.search(keyword)
    }

    /// Installed plugins in directory iteration order. Directories without a
    /// readable manifest are skipped.
    pub fn list_installed(&self) -> Vec<PluginMetadata> {
        let entries = match fs::read_dir(&self.install_dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(dir = ?self.install_dir, error = %err, "cannot read install dir");
                return Vec::new();
            }
        };

        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && PluginManifest::exists_in(path))
            .filter_map(|plugin_dir| match PluginManifest::load(&plugin_dir) {
                Ok(manifest) => Some(manifest.into_metadata(&plugin_dir)),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping installed plugin");
                    None
                }
            })
            .collect()
    }

    /// Install from a plugin directory or zip archive, replacing any existing
    /// installation under the same name. Files are left in place when the
    /// manifest turns out to be missing.
    pub fn install(&self, source: &Path) -> PluginResult<PluginMetadata> {
        let source = PluginSource::classify(source)?;
        let _lock = InstallLock::acquire(&self.install_dir)?;

        let plugin_dir = PluginInstaller::new(&self.install_dir).place(&source)?;

        if !PluginManifest::exists_in(&plugin_dir) {
            return Err(PluginError::InvalidPlugin {
                path: plugin_dir,
                reason: "missing manifest.json".to_string(),
            });
        }

        let metadata = PluginManifest::load(&plugin_dir)?.into_metadata(&plugin_dir);
        tracing::info!(
            name = %metadata.name,
            version = %metadata.version,
            path = ?metadata.path,
            "installed plugin"
        );
        Ok(metadata)
    }

    /// Remove the plugin directory named exactly `name`. Returns `false` when
    /// there is nothing to remove.
    pub fn uninstall(&self, name: &str) -> PluginResult<bool> {
        let Some(plugin_dir) = self.plugin_dir(name) else {
            return Ok(false);
        };

        let _lock = InstallLock::acquire(&self.install_dir)?;
        if !plugin_dir.is_dir() {
            return Ok(false);
        }

        fs::remove_dir_all(&plugin_dir).map_err(PluginError::io(&plugin_dir))?;
        tracing::info!(name, "uninstalled plugin");
        Ok(true)
    }

    /// Load the plugin's code module and run its self-test entry point.
    ///
    /// This executes plugin code in-process with the manager's privileges.
    pub fn run_test(&self, name: &str) -> PluginResult<bool> {
        let plugin_dir = self
            .plugin_dir(name)
            .filter(|dir| dir.is_dir())
            .ok_or_else(|| PluginError::NotInstalled {
                name: name.to_string(),
            })?;

        let manifest = PluginManifest::load(&plugin_dir).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "using default entry for plugin");
            PluginManifest::default()
        });

        let module = manifest.entry_path(&plugin_dir);
        if !module.is_file() {
            return Err(PluginError::MissingEntryPoint {
                name: name.to_string(),
                module,
            });
        }

        let _guard = self.resolvable.scoped(&plugin_dir);
        let mut plugin = self
            .loader
            .load(name, &module, &self.resolvable.snapshot())?;
        let passed = plugin.run_self_test()?;

        tracing::info!(name, passed, "plugin self-test finished");
        Ok(passed)
    }

    fn plugin_dir(&self, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name => {
                Some(self.install_dir.join(name))
            }
            _ => None,
        }
    }
}
