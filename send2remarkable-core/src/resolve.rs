//! Entry resolution: bibliography entries to absolute local attachment paths.
//!
//! Zotero exports attachments as `file:/abs/path.pdf:application/pdf`; other
//! tools write a plain path. Both end up as an absolute, lexically normalised
//! path with `~` expanded. Paths that do not exist are kept and logged.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::bibliography::BibEntry;
use crate::contract::{FileMeta, ResolvedFile};

pub const DEFAULT_TITLE: &str = "Untitled";

/// Resolved files keyed by citation key, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMap {
    records: Vec<ResolvedFile>,
    index: HashMap<String, usize>,
}

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record; an existing record with the same key is replaced in place.
    pub fn insert(&mut self, record: ResolvedFile) {
        match self.index.get(&record.bib_id) {
            Some(&slot) => self.records[slot] = record,
            None => {
                self.index.insert(record.bib_id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(&self, bib_id: &str) -> Option<&ResolvedFile> {
        self.index.get(bib_id).map(|&slot| &self.records[slot])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedFile> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a FileMap {
    type Item = &'a ResolvedFile;
    type IntoIter = std::slice::Iter<'a, ResolvedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<ResolvedFile> for FileMap {
    fn from_iter<I: IntoIterator<Item = ResolvedFile>>(iter: I) -> Self {
        let mut map = FileMap::new();
        for record in iter {
            map.insert(record);
        }
        map
    }
}

impl FileMeta {
    pub fn from_entry(bib_id: &str, entry: &BibEntry) -> Self {
        FileMeta {
            bib_id: bib_id.to_string(),
            title: entry.field("title").unwrap_or(DEFAULT_TITLE).to_string(),
            date: entry
                .field("date")
                .or_else(|| entry.field("year"))
                .unwrap_or_default()
                .to_string(),
            authors: entry.field("author").unwrap_or_default().to_string(),
            entry_type: entry
                .field("type")
                .unwrap_or(entry.entry_type.as_str())
                .to_string(),
            url: entry.field("url").map(str::to_string),
        }
    }
}

/// Builds the file map for every entry that has both a citation key and a
/// `file` field.
pub fn build_file_map(entries: &[BibEntry]) -> FileMap {
    let mut map = FileMap::new();

    for entry in entries {
        let Some(bib_id) = entry.id.as_deref() else {
            warn!(entry_type = %entry.entry_type, "Bibliography entry has no identifier, skipping");
            continue;
        };
        let Some(raw) = entry.file().filter(|raw| !raw.is_empty()) else {
            continue;
        };

        let path = resolve_location(raw);
        if path.exists() {
            debug!(bib_id, path = %path.display(), "Resolved attachment");
        } else {
            warn!(bib_id, path = %path.display(), "Attached file does not exist");
        }

        map.insert(ResolvedFile {
            bib_id: bib_id.to_string(),
            path,
            meta: FileMeta::from_entry(bib_id, entry),
        });
    }

    info!(
        entries = entries.len(),
        resolved = map.len(),
        "Built file map"
    );
    map
}

/// Full resolution of a raw `file` field to an absolute path.
pub fn resolve_location(raw: &str) -> PathBuf {
    absolutize(&expand_home(&normalise_file_field(raw)))
}

/// Strips Zotero's `file:` scheme and trailing mime type.
///
/// `file:///a/b.pdf:application/pdf` becomes `/a/b.pdf`. A location with a
/// colon but no `file` scheme keeps the text before its first colon. A
/// location without a colon is returned unchanged.
pub fn normalise_file_field(raw: &str) -> String {
    if !raw.contains(':') {
        return raw.to_string();
    }

    let mut parts = raw.split(':');
    let head = parts.next().unwrap_or_default();
    if head.eq_ignore_ascii_case("file") {
        let path = parts.next().unwrap_or_default();
        format!("/{}", path.trim_start_matches('/'))
    } else {
        head.to_string()
    }
}

/// Expands a leading `~` or `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => {
            warn!(path, "No home directory available, leaving path unexpanded");
            PathBuf::from(path)
        }
    }
}

/// Joins relative paths onto the current directory and collapses `.` and `..`.
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Cannot read current directory");
                path.to_path_buf()
            }
        }
    };
    normalise_lexically(&joined)
}

fn normalise_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
