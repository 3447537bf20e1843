use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by install, uninstall and self-test.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("plugin source must be a directory or zip file: {}", path.display())]
    InvalidSource { path: PathBuf },

    #[error("invalid plugin at {}: {reason}", path.display())]
    InvalidPlugin { path: PathBuf, reason: String },

    #[error("plugin '{name}' not installed")]
    NotInstalled { name: String },

    #[error("plugin '{name}' has no code module at {}", module.display())]
    MissingEntryPoint { name: String, module: PathBuf },

    #[error("failed to load plugin '{name}': {reason}")]
    LoadError { name: String, reason: String },

    #[error("plugin '{name}' violates the plugin contract: {reason}")]
    ContractViolation { name: String, reason: String },

    #[error("cannot extract archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PluginError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

pub type PluginResult<T> = Result<T, PluginError>;
