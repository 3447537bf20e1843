use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::model::catalogue::CatalogueEntry;
use crate::plugin::PluginManager;
use crate::plugin::manifest::PluginMetadata;

/// Manage local plugins.
#[derive(Debug, Parser)]
#[command(name = "plugin-market", version, about)]
pub struct Cli {
    /// JSON file describing available plugins.
    #[arg(long, global = true, value_name = "PATH")]
    pub catalogue: Option<PathBuf>,

    /// Directory where plugins are installed.
    #[arg(long, global = true, value_name = "PATH")]
    pub install_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List available plugins in the catalogue.
    List,
    /// List currently installed plugins.
    Installed,
    /// Install a plugin from a local directory or zip file.
    Install { source: PathBuf },
    /// Uninstall a plugin by name.
    Uninstall { name: String },
    /// Run an installed plugin's self-test.
    Test { name: String },
    /// Search available plugins by keyword.
    Search { keyword: String },
}

/// Outcome of a command: lines for stdout, plus whether it failed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub lines: Vec<String>,
    pub failed: bool,
}

impl Report {
    fn ok(lines: Vec<String>) -> Self {
        Self {
            lines,
            failed: false,
        }
    }

    fn failed(lines: Vec<String>) -> Self {
        Self {
            lines,
            failed: true,
        }
    }
}

pub fn dispatch(manager: &PluginManager, command: &Command) -> Result<Report> {
    let report = match command {
        Command::List => Report::ok(available_lines(manager.list_available())),
        Command::Installed => Report::ok(installed_lines(manager.list_installed())),
        Command::Install { source } => {
            let plugin = manager.install(source)?;
            Report::ok(vec![format!(
                "Installed {} version {}",
                plugin.name, plugin.version
            )])
        }
        Command::Uninstall { name } => {
            if manager.uninstall(name)? {
                Report::ok(vec![format!("Uninstalled {name}")])
            } else {
                Report::ok(vec![format!("Plugin '{name}' not found")])
            }
        }
        Command::Test { name } => match manager.run_test(name) {
            Ok(true) => Report::ok(vec![format!("Plugin '{name}' test passed")]),
            Ok(false) => Report::failed(vec![format!("Plugin '{name}' test returned false")]),
            Err(err) => {
                tracing::error!(name, error = %err, "plugin self-test failed");
                Report::failed(vec![format!("Error testing plugin '{name}': {err}")])
            }
        },
        Command::Search { keyword } => Report::ok(search_lines(keyword, &manager.search(keyword))),
    };

    Ok(report)
}

pub fn available_lines(entries: &[CatalogueEntry]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["No available plugins found in the catalogue.".to_string()];
    }

    let mut lines = vec!["Available plugins:".to_string()];
    lines.extend(entries.iter().map(entry_row));
    lines
}

pub fn installed_lines(mut plugins: Vec<PluginMetadata>) -> Vec<String> {
    if plugins.is_empty() {
        return vec!["No plugins installed.".to_string()];
    }

    plugins.sort_by(|a, b| a.name.cmp(&b.name));
    let mut lines = vec!["Installed plugins:".to_string()];
    lines.extend(plugins.iter().map(|plugin| {
        format!("- {} {}: {}", plugin.name, plugin.version, plugin.description)
    }));
    lines
}

pub fn search_lines(keyword: &str, matches: &[&CatalogueEntry]) -> Vec<String> {
    if matches.is_empty() {
        return vec![format!("No available plugins matching '{keyword}'.")];
    }

    let mut lines = vec![format!("Plugins matching '{keyword}':")];
    lines.extend(matches.iter().map(|entry| entry_row(entry)));
    lines
}

fn entry_row(entry: &CatalogueEntry) -> String {
    format!(
        "- {} {}: {}",
        entry.name.as_deref().unwrap_or_default(),
        entry.version.as_deref().unwrap_or_default(),
        entry.description.as_deref().unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "plugin-market",
            "install",
            "./foo",
            "--install-dir",
            "/tmp/plugins",
        ])
        .unwrap();

        assert_eq!(cli.install_dir, Some(PathBuf::from("/tmp/plugins")));
        assert!(matches!(cli.command, Command::Install { ref source } if source == &PathBuf::from("./foo")));
    }

    #[test]
    fn test_parse_requires_subcommand() {
        assert!(Cli::try_parse_from(["plugin-market"]).is_err());
    }

    #[test]
    fn test_available_lines() {
        assert_eq!(
            available_lines(&[]),
            vec!["No available plugins found in the catalogue."]
        );

        let entries = vec![
            CatalogueEntry::new("echo", "1.0", "Echo plugin"),
            CatalogueEntry {
                name: Some("bare".to_string()),
                ..Default::default()
            },
        ];
        assert_eq!(
            available_lines(&entries),
            vec!["Available plugins:", "- echo 1.0: Echo plugin", "- bare : "]
        );
    }

    #[test]
    fn test_installed_lines_sorted() {
        let plugin = |name: &str| PluginMetadata {
            name: name.to_string(),
            version: "0.0.0".to_string(),
            description: String::new(),
            path: PathBuf::from(name),
        };

        assert_eq!(installed_lines(Vec::new()), vec!["No plugins installed."]);
        assert_eq!(
            installed_lines(vec![plugin("zeta"), plugin("alpha")]),
            vec![
                "Installed plugins:",
                "- alpha 0.0.0: ",
                "- zeta 0.0.0: "
            ]
        );
    }

    #[test]
    fn test_search_lines() {
        let echo = CatalogueEntry::new("echo", "1.0", "Echo plugin");
        assert_eq!(
            search_lines("ECHO", &[&echo]),
            vec!["Plugins matching 'ECHO':", "- echo 1.0: Echo plugin"]
        );
        assert_eq!(
            search_lines("zzz", &[]),
            vec!["No available plugins matching 'zzz'."]
        );
    }

    #[test]
    fn test_dispatch_reports_test_errors() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            PluginManager::new(dir.path().join("installed"), &dir.path().join("none.json"))
                .unwrap();

        let report = dispatch(
            &manager,
            &Command::Test {
                name: "ghost".to_string(),
            },
        )
        .unwrap();
        assert!(report.failed);
        assert_eq!(
            report.lines,
            vec!["Error testing plugin 'ghost': plugin 'ghost' not installed"]
        );

        let report = dispatch(
            &manager,
            &Command::Uninstall {
                name: "ghost".to_string(),
            },
        )
        .unwrap();
        assert_eq!(report, Report::ok(vec!["Plugin 'ghost' not found".to_string()]));
    }
}
