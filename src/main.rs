mod cli;
mod model;
mod plugin;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use model::config::{self, AppConfig};
use plugin::PluginManager;

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    let config = AppConfig::load()?;

    // Initialize logging to file (stdout carries command output)
    let log_dir = config::log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "plugin-market.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(filter)
        .init();

    tracing::info!(command = ?args.command, "plugin-market starting");

    let install_dir = args.install_dir.unwrap_or_else(|| config.install_dir());
    let catalogue_path = args.catalogue.unwrap_or_else(|| config.catalogue_path());
    let manager = PluginManager::new(install_dir, &catalogue_path)?;
    tracing::debug!(install_dir = ?manager.install_dir(), ?catalogue_path, "manager ready");

    let report = match cli::dispatch(&manager, &args.command) {
        Ok(report) => report,
        Err(err) => {
            tracing::error!("command failed: {err:?}");
            eprintln!("plugin-market error: {err}");
            return Ok(ExitCode::FAILURE);
        }
    };

    for line in &report.lines {
        if report.failed {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    Ok(if report.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
