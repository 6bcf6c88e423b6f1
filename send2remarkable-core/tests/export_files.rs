use send2remarkable_core::contract::{FileMeta, ResolvedFile};
use send2remarkable_core::export::export_files;
use send2remarkable_core::resolve::FileMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn record(bib_id: &str, path: &Path) -> ResolvedFile {
    ResolvedFile {
        bib_id: bib_id.to_string(),
        path: path.to_path_buf(),
        meta: FileMeta {
            bib_id: bib_id.to_string(),
            title: "Untitled".into(),
            date: String::new(),
            authors: String::new(),
            entry_type: "misc".into(),
            url: None,
        },
    }
}

#[test]
fn test_export_copies_and_renames_on_conflict() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    let target = out.path().join("copied_files");

    let first = src.path().join("one/paper.pdf");
    let second = src.path().join("two/paper.pdf");
    let third = src.path().join("three/paper.pdf");
    for (path, body) in [(&first, "1"), (&second, "2"), (&third, "3")] {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    let map: FileMap = vec![
        record("first", &first),
        record("second", &second),
        record("first", &third),
    ]
    .into_iter()
    .collect();
    // "first" was replaced by the third file, so only two records remain.
    assert_eq!(map.len(), 2);

    let report = export_files(&map, &target).expect("export should run");
    assert_eq!(report.copied, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(fs::read_to_string(target.join("paper.pdf")).unwrap(), "3");
    assert_eq!(
        fs::read_to_string(target.join("paper_second.pdf")).unwrap(),
        "2"
    );
}

#[test]
fn test_export_skips_double_conflict_and_counts_missing_sources() {
    let src = tempdir().unwrap();
    let target = tempdir().unwrap();

    let paper = src.path().join("paper.pdf");
    fs::write(&paper, "new").unwrap();
    fs::write(target.path().join("paper.pdf"), "old").unwrap();
    fs::write(target.path().join("paper_k.pdf"), "old").unwrap();

    let map: FileMap = vec![
        record("k", &paper),
        record("gone", &src.path().join("gone.epub")),
    ]
    .into_iter()
    .collect();

    let report = export_files(&map, target.path()).unwrap();
    assert_eq!(report.copied, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(
        fs::read_to_string(target.path().join("paper.pdf")).unwrap(),
        "old"
    );
    assert_eq!(report.to_string(), "0 files copied, 1 skipped, 1 failed");
}

#[test]
fn test_export_keeps_modification_time() {
    use filetime::{set_file_mtime, FileTime};

    let src = tempdir().unwrap();
    let target = tempdir().unwrap();
    let paper = src.path().join("paper.pdf");
    fs::write(&paper, "%PDF-1.4").unwrap();
    let written = FileTime::from_unix_time(1_500_000_000, 0);
    set_file_mtime(&paper, written).unwrap();

    let map: FileMap = vec![record("k", &paper)].into_iter().collect();
    let report = export_files(&map, target.path()).unwrap();
    assert_eq!(report.copied, 1);

    let copied = fs::metadata(target.path().join("paper.pdf")).unwrap();
    assert_eq!(FileTime::from_last_modification_time(&copied), written);
}
