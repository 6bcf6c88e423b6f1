//! # Upload client (CLI <-> Core)
//!
//! Process-spawning implementation of
//! [`send2remarkable_core::contract::UploadClient`]. Every call runs the
//! configured client binary (`rmapi` by default) once and captures its exit
//! status and output; the core crate decides what the output means.
//!
//! ## Startup checks
//! - [`RemarkableClient::locate`] fails when the binary cannot be found or is
//!   not executable.
//! - Session checking lives in the core crate
//!   ([`check_authentication`](send2remarkable_core::synchronise::check_authentication))
//!   and goes through [`UploadClient::ls`] and [`UploadClient::login`].

use async_trait::async_trait;
use send2remarkable_core::config::ClientConfig;
use send2remarkable_core::contract::{ClientError, ClientOutput, UploadClient};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ClientLookupError {
    #[error("upload client {binary:?} not found or not executable: {source}")]
    NotFound {
        binary: PathBuf,
        #[source]
        source: which::Error,
    },
}

pub struct RemarkableClient {
    binary: PathBuf,
}

impl RemarkableClient {
    /// Resolves the configured binary on `PATH` (or as a path) and checks it
    /// is executable.
    pub fn locate(config: &ClientConfig) -> Result<Self, ClientLookupError> {
        match which::which(&config.binary) {
            Ok(binary) => {
                tracing::info!(binary = %binary.display(), "Located upload client");
                Ok(Self { binary })
            }
            Err(source) => {
                tracing::error!(binary = %config.binary.display(), error = %source, "Upload client not found or not executable");
                Err(ClientLookupError::NotFound {
                    binary: config.binary.clone(),
                    source,
                })
            }
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn capture<I, S>(&self, args: I) -> Result<ClientOutput, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.capture_with_stdin(args, Stdio::null()).await
    }

    /// Runs the client to completion, capturing stdout and stderr. `stdin` is
    /// passed through as given.
    async fn capture_with_stdin<I, S>(&self, args: I, stdin: Stdio) -> Result<ClientOutput, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(stdin)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                tracing::error!(binary = %self.binary.display(), error = ?e, "Failed to launch upload client");
                e
            })?;
        Ok(client_output(output))
    }
}

fn client_output(output: Output) -> ClientOutput {
    ClientOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

#[async_trait]
impl UploadClient for RemarkableClient {
    async fn put(
        &self,
        local_path: &Path,
        remote_folder: &str,
    ) -> Result<ClientOutput, ClientError> {
        tracing::debug!(path = %local_path.display(), remote_folder, "Running client put");
        self.capture([
            OsStr::new("put"),
            local_path.as_os_str(),
            OsStr::new(remote_folder),
        ])
        .await
    }

    async fn mkdir(&self, remote_folder: &str) -> Result<ClientOutput, ClientError> {
        tracing::debug!(remote_folder, "Running client mkdir");
        self.capture(["mkdir", remote_folder]).await
    }

    async fn ls(&self) -> Result<ClientOutput, ClientError> {
        tracing::debug!("Running client ls");
        // A client without a session prompts for a code on stdin. It must block
        // there until the auth timeout rather than read EOF and exit.
        self.capture_with_stdin(["ls"], Stdio::inherit()).await
    }

    async fn login(&self) -> Result<ClientOutput, ClientError> {
        tracing::info!(binary = %self.binary.display(), "Starting interactive authentication");
        let status = Command::new(&self.binary)
            .arg("ls")
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;
        Ok(ClientOutput {
            success: status.success(),
            code: status.code(),
            ..ClientOutput::default()
        })
    }
}
