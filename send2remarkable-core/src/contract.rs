//! # contract: the upload client interface and the records passed through the pipeline
//!
//! This module defines a single trait ([`UploadClient`]) for the external
//! command-line program that owns authentication and transfer to the tablet's
//! document store, plus the plain data types the resolver, transfer driver and
//! report share.
//!
//! ## Interface
//! - The client is only observable through its exit status and output text,
//!   so every call returns a [`ClientOutput`] rather than a typed result.
//! - `Err` is reserved for failing to run the client at all (spawn errors).
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; `MockUploadClient` is exported under
//!   the `test-export-mocks` feature for use by dependent crates' tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Error for a client invocation that never produced an exit status.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Descriptive metadata copied from the bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMeta {
    pub bib_id: String,
    pub title: String,
    pub date: String,
    pub authors: String,
    pub entry_type: String,
    pub url: Option<String>,
}

/// A bibliography entry resolved to an absolute local path.
///
/// The path is not guaranteed to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFile {
    pub bib_id: String,
    pub path: PathBuf,
    pub meta: FileMeta,
}

/// Classification of a single transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadOutcome {
    Uploaded,
    AlreadyExists,
    /// The client itself refused the file type.
    UnsupportedExtension,
    /// Our own allow-list rejected the file; the client was not called.
    PreFiltered,
    /// The local file does not exist; the client was not called.
    MissingSource,
    Failed,
}

impl UploadOutcome {
    pub const ALL: [UploadOutcome; 6] = [
        UploadOutcome::Uploaded,
        UploadOutcome::AlreadyExists,
        UploadOutcome::UnsupportedExtension,
        UploadOutcome::PreFiltered,
        UploadOutcome::MissingSource,
        UploadOutcome::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadOutcome::Uploaded => "uploaded",
            UploadOutcome::AlreadyExists => "already-exists",
            UploadOutcome::UnsupportedExtension => "unsupported-extension",
            UploadOutcome::PreFiltered => "pre-filtered",
            UploadOutcome::MissingSource => "missing-source",
            UploadOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one invocation of the client produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOutput {
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ClientOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }
}

/// The external upload client (`put`, `mkdir`, `ls`).
///
/// Implemented by the process-spawning client in the binary crate and by
/// mocks in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait UploadClient: Send + Sync {
    /// `<client> put <local_path> <remote_folder>`
    async fn put(&self, local_path: &Path, remote_folder: &str)
        -> Result<ClientOutput, ClientError>;

    /// `<client> mkdir <remote_folder>`
    async fn mkdir(&self, remote_folder: &str) -> Result<ClientOutput, ClientError>;

    /// `<client> ls`, used as a cheap authenticated round-trip.
    async fn ls(&self) -> Result<ClientOutput, ClientError>;

    /// Runs the client attached to the terminal so the user can finish its
    /// login flow. Output is not captured.
    async fn login(&self) -> Result<ClientOutput, ClientError>;
}
