use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    pub install_dir: String,
    pub catalogue: String,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let mut config = Self::defaults()?;

        if let Some(config_path) = user_config_path()
            && config_path.exists()
        {
            let user_str = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            config = toml::from_str(&user_str)
                .with_context(|| format!("parsing {}", config_path.display()))?;
        }

        Ok(config)
    }

    pub fn defaults() -> Result<Self> {
        let defaults = include_str!("../../config/default.toml");
        Ok(toml::from_str(defaults)?)
    }

    pub fn install_dir(&self) -> PathBuf {
        expand_tilde(Path::new(&self.paths.install_dir))
    }

    pub fn catalogue_path(&self) -> PathBuf {
        expand_tilde(Path::new(&self.paths.catalogue))
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn log_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("plugin-market"))
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "plugin-market")
}

/// Replace a leading `~` with the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if !text.starts_with('~') {
        return path.to_path_buf();
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        let home = base_dirs.home_dir().to_string_lossy();
        return PathBuf::from(text.replacen('~', &home, 1));
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let config = AppConfig::defaults().unwrap();
        assert_eq!(config.paths.install_dir, "~/.mcp/plugins_installed");
        assert_eq!(config.logging.filter, "plugin_market=info");
        assert!(config.install_dir().ends_with(".mcp/plugins_installed"));
        assert!(config.catalogue_path().ends_with(".mcp/available_plugins.json"));
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        let path = Path::new("/opt/plugins");
        assert_eq!(expand_tilde(path), PathBuf::from("/opt/plugins"));
    }

    #[test]
    fn test_expand_tilde_uses_home() {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return;
        };
        let expanded = expand_tilde(Path::new("~/x"));
        assert_eq!(expanded, base_dirs.home_dir().join("x"));
    }
}
