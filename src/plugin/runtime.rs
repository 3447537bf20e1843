use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::plugin::error::{PluginError, PluginResult};

/// Export every plugin module must provide.
pub const ENTRY_POINT: &str = "run_test";

/// The capability a loaded plugin module exposes to the manager.
pub trait SelfTest {
    fn run_self_test(&mut self) -> PluginResult<bool>;
}

/// Turns a code module on disk into a runnable [`SelfTest`].
///
/// `resolvable` lists the directories the module may reach while it runs; the
/// plugin's own directory is always the last entry.
pub trait ModuleLoader {
    fn load(
        &self,
        name: &str,
        module: &Path,
        resolvable: &[PathBuf],
    ) -> PluginResult<Box<dyn SelfTest>>;
}

/// Directories currently made visible to loaded plugin code.
#[derive(Debug, Default)]
pub struct ResolvablePaths {
    dirs: RefCell<Vec<PathBuf>>,
}

impl ResolvablePaths {
    /// Make `dir` resolvable until the returned guard is dropped.
    pub fn scoped(&self, dir: &Path) -> ResolvableGuard<'_> {
        self.dirs.borrow_mut().push(dir.to_path_buf());
        tracing::debug!(?dir, "plugin directory resolvable");
        ResolvableGuard {
            paths: self,
            dir: dir.to_path_buf(),
        }
    }

    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.dirs.borrow().clone()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.dirs.borrow().is_empty()
    }
}

#[derive(Debug)]
pub struct ResolvableGuard<'a> {
    paths: &'a ResolvablePaths,
    dir: PathBuf,
}

impl Drop for ResolvableGuard<'_> {
    fn drop(&mut self) {
        let mut dirs = self.paths.dirs.borrow_mut();
        if let Some(pos) = dirs.iter().rposition(|dir| *dir == self.dir) {
            dirs.remove(pos);
        }
        tracing::debug!(dir = ?self.dir, "plugin directory released");
    }
}

/// Interpret the entry point's output. Only the JSON literals `true` and
/// `false` are accepted.
pub fn decode_verdict(name: &str, output: &[u8]) -> PluginResult<bool> {
    let violation = |reason: String| PluginError::ContractViolation {
        name: name.to_string(),
        reason,
    };

    let text = std::str::from_utf8(output)
        .map_err(|_| violation(format!("{ENTRY_POINT} returned non-UTF-8 output")))?;

    match text.trim_ascii() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(violation(format!(
            "{ENTRY_POINT} must return true or false, got {other:?}"
        ))),
    }
}

#[cfg(feature = "plugins")]
pub use wasm::WasmLoader;

pub fn default_loader() -> Box<dyn ModuleLoader> {
    #[cfg(feature = "plugins")]
    {
        Box::new(WasmLoader)
    }

    #[cfg(not(feature = "plugins"))]
    {
        Box::new(UnavailableLoader)
    }
}

#[cfg(not(feature = "plugins"))]
#[derive(Debug, Default)]
struct UnavailableLoader;

#[cfg(not(feature = "plugins"))]
impl ModuleLoader for UnavailableLoader {
    fn load(&self, name: &str, _: &Path, _: &[PathBuf]) -> PluginResult<Box<dyn SelfTest>> {
        Err(PluginError::LoadError {
            name: name.to_string(),
            reason: "plugin runtime not compiled in".to_string(),
        })
    }
}

#[cfg(feature = "plugins")]
mod wasm {
    use super::*;

    use extism::{Manifest, Plugin, Wasm};

    /// Loads plugin modules as WebAssembly through Extism, with WASI enabled.
    /// Every resolvable directory is mounted in the guest at its host path.
    #[derive(Debug, Default)]
    pub struct WasmLoader;

    impl ModuleLoader for WasmLoader {
        fn load(
            &self,
            name: &str,
            module: &Path,
            resolvable: &[PathBuf],
        ) -> PluginResult<Box<dyn SelfTest>> {
            let manifest = resolvable
                .iter()
                .fold(Manifest::new([Wasm::file(module)]), |manifest, dir| {
                    manifest.with_allowed_path(dir.to_string_lossy().into_owned(), dir)
                });

            let plugin = Plugin::new(manifest, [], true).map_err(|err| PluginError::LoadError {
                name: name.to_string(),
                reason: err.to_string(),
            })?;

            if !plugin.function_exists(ENTRY_POINT) {
                return Err(PluginError::ContractViolation {
                    name: name.to_string(),
                    reason: format!("module does not export {ENTRY_POINT}"),
                });
            }

            Ok(Box::new(WasmSelfTest {
                name: name.to_string(),
                plugin,
            }))
        }
    }

    struct WasmSelfTest {
        name: String,
        plugin: Plugin,
    }

    impl SelfTest for WasmSelfTest {
        fn run_self_test(&mut self) -> PluginResult<bool> {
            let output = self
                .plugin
                .call::<&str, &[u8]>(ENTRY_POINT, "")
                .map_err(|err| PluginError::LoadError {
                    name: self.name.clone(),
                    reason: format!("{ENTRY_POINT} failed: {err}"),
                })?;

            decode_verdict(&self.name, output)
        }
    }
}
