//! High-level pipeline: bibliography → file map → device folder.
//!
//! A run:
//!   - parses the configured bibliography
//!   - resolves every entry with an attachment to a local path
//!   - makes sure the remote folder exists
//!   - hands each eligible file to the upload client and tallies the outcome
//!
//! Only an unreadable bibliography aborts a run. Authentication is checked
//! separately with [`check_authentication`] before a run starts.
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Supporting types: [`SynchroniseConfig`], [`SynchroniseReport`].

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::bibliography::load_bibliography;
use crate::contract::UploadClient;
use crate::error::SyncError;
use crate::resolve::build_file_map;
use crate::transfer::{transfer_all, TransferReport};

/// Inputs of one sync run.
#[derive(Debug, Clone)]
pub struct SynchroniseConfig {
    pub bibliography: PathBuf,
    pub remote_folder: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynchroniseReport {
    /// Entries parsed from the bibliography.
    pub entries: usize,
    /// Entries that resolved to a local file.
    pub resolved: usize,
    pub transfer: TransferReport,
}

pub async fn synchronise<C>(
    config: &SynchroniseConfig,
    client: &C,
) -> Result<SynchroniseReport, SyncError>
where
    C: UploadClient + ?Sized,
{
    info!(
        bibliography = %config.bibliography.display(),
        remote_folder = %config.remote_folder,
        "[SYNC] Starting synchronisation"
    );

    let bibliography = load_bibliography(&config.bibliography).map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Could not load bibliography");
        e
    })?;

    let file_map = build_file_map(&bibliography.entries);
    info!(resolved = file_map.len(), "[SYNC] Resolved attachments");

    let transfer = transfer_all(client, &file_map, &config.remote_folder).await;

    let report = SynchroniseReport {
        entries: bibliography.entries.len(),
        resolved: file_map.len(),
        transfer,
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => debug!(json = %json, "[SYNC][DEBUG] Report as JSON"),
        Err(e) => error!(error = ?e, "[SYNC][DEBUG] Failed to serialise report"),
    }
    Ok(report)
}

/// Verifies the client holds a working session.
///
/// `ls` must finish within `timeout`. If it does not, the client is assumed to
/// be waiting for a one-time code, so it is re-run attached to the terminal
/// via [`UploadClient::login`].
pub async fn check_authentication<C>(client: &C, timeout: Duration) -> Result<(), SyncError>
where
    C: UploadClient + ?Sized,
{
    debug!(timeout_secs = timeout.as_secs_f64(), "Checking upload client session");

    let output = match tokio::time::timeout(timeout, client.ls()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            error!(error = %e, "Failed to run upload client for session check");
            return Err(SyncError::Authentication(e.to_string()));
        }
        Err(_) => {
            warn!(
                timeout_secs = timeout.as_secs_f64(),
                "Upload client did not answer in time, interactive authentication required"
            );
            client
                .login()
                .await
                .map_err(|e| SyncError::Authentication(e.to_string()))?
        }
    };

    if output.success {
        info!("Upload client is authenticated");
        Ok(())
    } else {
        let reason = match output.stderr.trim() {
            "" => format!("client exited with {:?}", output.code),
            stderr => stderr.to_string(),
        };
        error!(code = ?output.code, reason = %reason, "Upload client authentication failed");
        Err(SyncError::Authentication(reason))
    }
}
