use std::path::PathBuf;

use crate::bibliography::BibliographyError;

/// Fatal errors of a sync run. Per-file problems are tallied, not raised.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Bibliography(#[from] BibliographyError),

    #[error("authentication with the upload client failed: {0}")]
    Authentication(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Bibliography(#[from] BibliographyError),

    #[error("failed to create export directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
