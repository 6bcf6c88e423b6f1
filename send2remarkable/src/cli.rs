//! # send2remarkable CLI Interface (Module)
//!
//! Command parsing and orchestration for the `send2remarkable` binary. All
//! pipeline logic lives in [`send2remarkable_core`]; this module wires the
//! config, the process-spawning upload client and the watcher together.
//!
//! ## Subcommands
//! - `sync`: check the client, then upload every eligible attachment
//! - `watch`: re-run `sync` each time the bibliography changes
//! - `export`: copy attachments into a local directory instead
//!
//! For programmatic/integration use, call [`run`] with a constructed [`Cli`].

use crate::load_config::load_config;
use crate::upload::RemarkableClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use send2remarkable_core::bibliography::load_bibliography;
use send2remarkable_core::export::export_files;
use send2remarkable_core::resolve::build_file_map;
use send2remarkable_core::synchronise::{check_authentication, synchronise};
use std::path::PathBuf;

/// CLI for send2remarkable: push bibliography attachments to a reMarkable.
#[derive(Parser)]
#[clap(
    name = "send2remarkable",
    version,
    about = "Send the files attached to a BibTeX bibliography to a reMarkable tablet"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload all attached files from the bibliography in the config file
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Print the full report as JSON instead of a summary line
        #[clap(long)]
        json: bool,
    },
    /// Run `sync` every time the bibliography file is modified
    Watch {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Copy all attached files into a local directory
    Export {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Overrides `export_dir` from the config file
        #[clap(long)]
        target_dir: Option<PathBuf>,
        /// Print the report as JSON instead of a summary line
        #[clap(long)]
        json: bool,
    },
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config, json } => {
            let config = load_config(config)?;
            tracing::info!(command = "sync", "Starting synchronisation process");

            let client = RemarkableClient::locate(&config.client)?;
            check_authentication(&client, config.client.auth_timeout()).await?;

            match synchronise(&config.synchronise_config(), &client).await {
                Ok(report) => {
                    tracing::info!(command = "sync", entries = report.entries, resolved = report.resolved, "Synchronisation complete");
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        println!("Synchronise report: {}", report.transfer);
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(e.into())
                }
            }
        }
        Commands::Watch { config: config_path } => {
            let config = load_config(&config_path)?;
            tracing::info!(command = "watch", "Starting watcher");
            crate::watch::watch(&config_path, &config.bibliography).await
        }
        Commands::Export {
            config,
            target_dir,
            json,
        } => {
            let config = load_config(config)?;
            let target_dir = target_dir.unwrap_or_else(|| config.export_dir.clone());
            tracing::info!(command = "export", target_dir = %target_dir.display(), "Starting export");

            let bibliography = load_bibliography(&config.bibliography)?;
            let file_map = build_file_map(&bibliography.entries);
            let report = export_files(&file_map, &target_dir)
                .with_context(|| format!("Export to {target_dir:?} failed"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Export report: {report}");
            }
            Ok(())
        }
    }
}
