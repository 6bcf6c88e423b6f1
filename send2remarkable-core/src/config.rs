use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::synchronise::SynchroniseConfig;

pub const DEFAULT_CLIENT_BINARY: &str = "rmapi";
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REMOTE_FOLDER: &str = "/";
pub const DEFAULT_EXPORT_DIR: &str = "copied_files";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bibliography: PathBuf,
    #[serde(default = "default_remote_folder")]
    pub remote_folder: String,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default)]
    pub client: ClientConfig,
}

/// How to reach the external upload client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Program name looked up on `PATH`, or a path to it.
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            auth_timeout_secs: default_auth_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

impl Config {
    pub fn synchronise_config(&self) -> SynchroniseConfig {
        SynchroniseConfig {
            bibliography: self.bibliography.clone(),
            remote_folder: self.remote_folder.clone(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            bibliography = %self.bibliography.display(),
            remote_folder = %self.remote_folder,
            client = %self.client.binary.display(),
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

fn default_remote_folder() -> String {
    DEFAULT_REMOTE_FOLDER.to_string()
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(DEFAULT_EXPORT_DIR)
}

fn default_binary() -> PathBuf {
    PathBuf::from(DEFAULT_CLIENT_BINARY)
}

fn default_auth_timeout_secs() -> u64 {
    DEFAULT_AUTH_TIMEOUT_SECS
}
