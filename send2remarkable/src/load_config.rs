//! `load_config` module: reads the YAML config file and applies environment overrides.
//!
//! This is the only place where user-supplied YAML is parsed into the
//! strongly-typed [`Config`] of the core crate.
//!
//! # Responsibilities
//! - Parse the YAML file into [`Config`], filling defaults for optional keys
//! - Expand `~` and make the bibliography and export paths absolute, so the
//!   watcher and any re-spawned sync see the same paths regardless of cwd
//! - Apply `SEND2REMARKABLE_CLIENT`, which overrides `client.binary`
//!
//! # Errors
//! All errors use `anyhow::Error` and surface at the CLI boundary.

use anyhow::{Context, Result};
use send2remarkable_core::config::Config;
use send2remarkable_core::resolve::{absolutize, expand_home};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Environment variable overriding the configured client binary.
pub const CLIENT_ENV: &str = "SEND2REMARKABLE_CLIENT";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref)
        .map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            e
        })
        .with_context(|| format!("Failed to read config file {path_ref:?}"))?;

    let mut config: Config = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    config.bibliography = resolve_config_path(&config.bibliography);
    config.export_dir = resolve_config_path(&config.export_dir);

    if let Some(binary) = std::env::var_os(CLIENT_ENV).filter(|v| !v.is_empty()) {
        info!(env = CLIENT_ENV, binary = ?binary, "Client binary overridden from environment");
        config.client.binary = PathBuf::from(binary);
    }

    config.trace_loaded();
    Ok(config)
}

fn resolve_config_path(path: &Path) -> PathBuf {
    absolutize(&expand_home(&path.to_string_lossy()))
}
