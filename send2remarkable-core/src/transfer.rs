//! Transfer driver: one `put` per eligible file, classified and tallied.
//!
//! Files are handled strictly in order. Nothing is retried; a failed file is
//! counted and the loop moves on.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

use crate::contract::{ClientOutput, ResolvedFile, UploadClient, UploadOutcome};
use crate::resolve::FileMap;

/// Extensions the tablet accepts, lower-case and without the dot.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "epub", "txt", "md"];

/// Client output markers, checked in order against stderr then stdout.
///
/// The client has no machine-readable mode for `put`, so this table is the
/// whole contract with it.
const OUTCOME_MARKERS: [(&str, UploadOutcome); 2] = [
    (r"(?i)already\s+exists", UploadOutcome::AlreadyExists),
    (
        r"(?i)unsupported\s+file\s+extension",
        UploadOutcome::UnsupportedExtension,
    ),
];

fn outcome_markers() -> &'static [(Regex, UploadOutcome)] {
    static MARKERS: OnceLock<Vec<(Regex, UploadOutcome)>> = OnceLock::new();
    MARKERS.get_or_init(|| {
        OUTCOME_MARKERS
            .iter()
            .filter_map(|(pattern, outcome)| match Regex::new(pattern) {
                Ok(re) => Some((re, *outcome)),
                Err(e) => {
                    error!(pattern, error = %e, "Invalid outcome marker");
                    None
                }
            })
            .collect()
    })
}

pub fn is_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Maps one client invocation to an outcome.
pub fn classify(output: &ClientOutput) -> UploadOutcome {
    if output.success {
        return UploadOutcome::Uploaded;
    }
    for text in [&output.stderr, &output.stdout] {
        if let Some((_, outcome)) = outcome_markers().iter().find(|(re, _)| re.is_match(text)) {
            return *outcome;
        }
    }
    UploadOutcome::Failed
}

/// The result for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub bib_id: String,
    pub path: PathBuf,
    pub outcome: UploadOutcome,
    /// Client error text for failures, if any.
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub records: Vec<TransferRecord>,
}

impl TransferReport {
    pub fn count(&self, outcome: UploadOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Tally for every outcome, zeros included.
    pub fn counts(&self) -> BTreeMap<UploadOutcome, usize> {
        UploadOutcome::ALL
            .iter()
            .map(|outcome| (*outcome, self.count(*outcome)))
            .collect()
    }
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} already existing, {} pre-filtered, {} rejected by client, {} missing source, {} failed",
            self.count(UploadOutcome::Uploaded),
            self.count(UploadOutcome::AlreadyExists),
            self.count(UploadOutcome::PreFiltered),
            self.count(UploadOutcome::UnsupportedExtension),
            self.count(UploadOutcome::MissingSource),
            self.count(UploadOutcome::Failed),
        )
    }
}

/// Creates the remote folder. Returns whether it is usable afterwards.
pub async fn ensure_remote_folder<C>(client: &C, remote_folder: &str) -> bool
where
    C: UploadClient + ?Sized,
{
    if remote_folder.trim_matches('/').is_empty() {
        return true;
    }

    match client.mkdir(remote_folder).await {
        Ok(output) => match classify(&output) {
            UploadOutcome::Uploaded => {
                info!(remote_folder, "Created remote folder");
                true
            }
            UploadOutcome::AlreadyExists => {
                debug!(remote_folder, "Remote folder already exists");
                true
            }
            _ => {
                warn!(remote_folder, code = ?output.code, stderr = %output.stderr.trim(), "Could not create remote folder");
                false
            }
        },
        Err(e) => {
            error!(remote_folder, error = %e, "Failed to run upload client for mkdir");
            false
        }
    }
}

/// Transfers a single resolved file.
pub async fn transfer_file<C>(client: &C, file: &ResolvedFile, remote_folder: &str) -> TransferRecord
where
    C: UploadClient + ?Sized,
{
    let record = |outcome, detail| TransferRecord {
        bib_id: file.bib_id.clone(),
        path: file.path.clone(),
        outcome,
        detail,
    };

    if !is_allowed_extension(&file.path) {
        info!(bib_id = %file.bib_id, path = %file.path.display(), "Skipping file with unsupported extension");
        return record(UploadOutcome::PreFiltered, None);
    }
    if !file.path.exists() {
        warn!(bib_id = %file.bib_id, path = %file.path.display(), "Source file not found");
        return record(UploadOutcome::MissingSource, None);
    }

    info!(bib_id = %file.bib_id, path = %file.path.display(), remote_folder, "Uploading file");
    match client.put(&file.path, remote_folder).await {
        Ok(output) => {
            let outcome = classify(&output);
            match outcome {
                UploadOutcome::Uploaded => {
                    info!(bib_id = %file.bib_id, "Upload succeeded")
                }
                UploadOutcome::AlreadyExists => {
                    info!(bib_id = %file.bib_id, "Already on the device")
                }
                _ => {
                    error!(bib_id = %file.bib_id, %outcome, code = ?output.code, stderr = %output.stderr.trim(), "Upload failed")
                }
            }
            let detail = (!output.success)
                .then(|| output.stderr.trim().to_string())
                .filter(|s| !s.is_empty());
            record(outcome, detail)
        }
        Err(e) => {
            error!(bib_id = %file.bib_id, error = %e, "Failed to run upload client");
            record(UploadOutcome::Failed, Some(e.to_string()))
        }
    }
}

/// Ensures the remote folder, then transfers every file in map order.
pub async fn transfer_all<C>(client: &C, files: &FileMap, remote_folder: &str) -> TransferReport
where
    C: UploadClient + ?Sized,
{
    if !ensure_remote_folder(client, remote_folder).await {
        warn!(remote_folder, "Continuing without a confirmed remote folder");
    }

    let mut report = TransferReport::default();
    for file in files {
        report.records.push(transfer_file(client, file, remote_folder).await);
    }

    info!(
        total = report.records.len(),
        uploaded = report.count(UploadOutcome::Uploaded),
        already_exists = report.count(UploadOutcome::AlreadyExists),
        pre_filtered = report.count(UploadOutcome::PreFiltered),
        unsupported = report.count(UploadOutcome::UnsupportedExtension),
        missing_source = report.count(UploadOutcome::MissingSource),
        failed = report.count(UploadOutcome::Failed),
        "Transfer complete"
    );
    report
}
