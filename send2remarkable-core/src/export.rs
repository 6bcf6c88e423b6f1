//! Local export: copy resolved attachments into one directory.
//!
//! A name clash gets the citation key appended to the file stem; a second
//! clash skips the file. Copies keep the source's access and modification
//! times.

use filetime::FileTime;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::contract::ResolvedFile;
use crate::error::ExportError;
use crate::resolve::FileMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files copied, {} skipped, {} failed",
            self.copied, self.skipped, self.failed
        )
    }
}

/// Destination for `file` in `target_dir`, or `None` when both the plain and
/// the key-suffixed name are taken.
pub fn destination_for(file: &ResolvedFile, target_dir: &Path) -> Option<PathBuf> {
    let file_name = file.path.file_name()?;
    let plain = target_dir.join(file_name);
    if !plain.exists() {
        return Some(plain);
    }

    let stem = file
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffixed = match file.path.extension() {
        Some(ext) => format!("{stem}_{}.{}", file.bib_id, ext.to_string_lossy()),
        None => format!("{stem}_{}", file.bib_id),
    };
    let suffixed = target_dir.join(suffixed);
    (!suffixed.exists()).then_some(suffixed)
}

/// Copies `from` to `to` and carries over access and modification times.
pub fn copy_preserving_times(from: &Path, to: &Path) -> io::Result<u64> {
    let bytes = std::fs::copy(from, to)?;
    let meta = std::fs::metadata(from)?;
    filetime::set_file_times(
        to,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )?;
    Ok(bytes)
}

pub fn export_files(files: &FileMap, target_dir: &Path) -> Result<ExportReport, ExportError> {
    std::fs::create_dir_all(target_dir).map_err(|source| ExportError::CreateDir {
        path: target_dir.to_path_buf(),
        source,
    })?;

    let mut report = ExportReport::default();
    for file in files {
        let Some(dest) = destination_for(file, target_dir) else {
            info!(bib_id = %file.bib_id, path = %file.path.display(), "File already exists, skipping");
            report.skipped += 1;
            continue;
        };

        if !file.path.exists() {
            warn!(bib_id = %file.bib_id, path = %file.path.display(), "Source file not found");
            report.failed += 1;
            continue;
        }

        match copy_preserving_times(&file.path, &dest) {
            Ok(bytes) => {
                info!(bib_id = %file.bib_id, from = %file.path.display(), to = %dest.display(), bytes, "Copied");
                report.copied += 1;
            }
            Err(e) => {
                error!(bib_id = %file.bib_id, error = %e, path = %file.path.display(), "Error copying file");
                report.failed += 1;
            }
        }
    }

    info!(
        target_dir = %target_dir.display(),
        copied = report.copied,
        skipped = report.skipped,
        failed = report.failed,
        "Copy operation completed"
    );
    Ok(report)
}
