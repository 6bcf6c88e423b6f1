use send2remarkable_core::bibliography::{parse_bibliography, BibEntry};
use send2remarkable_core::resolve::{build_file_map, resolve_location};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_zotero_uri_resolves_to_absolute_path() {
    assert_eq!(
        resolve_location("file:/a/b/c.pdf:application/pdf"),
        PathBuf::from("/a/b/c.pdf")
    );
}

#[test]
#[serial]
fn test_plain_relative_location_is_made_absolute() {
    let tmp = tempdir().unwrap();
    let previous = env::current_dir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    let resolved = resolve_location("papers/x.pdf");
    let cwd = env::current_dir().unwrap();
    env::set_current_dir(previous).unwrap();

    assert_eq!(resolved, cwd.join("papers/x.pdf"));
}

#[test]
#[serial]
fn test_home_shorthand_is_expanded() {
    let tmp = tempdir().unwrap();
    let previous = env::var_os("HOME");
    env::set_var("HOME", tmp.path());

    let resolved = resolve_location("~/Zotero/x.epub");

    match previous {
        Some(home) => env::set_var("HOME", home),
        None => env::remove_var("HOME"),
    }
    assert_eq!(resolved, tmp.path().join("Zotero/x.epub"));
}

#[test]
fn test_entries_without_id_or_file_are_excluded() {
    let entries = vec![
        BibEntry::new(None, "article").with_field("file", "/tmp/no-id.pdf"),
        BibEntry::new(Some("nofile".into()), "article").with_field("title", "No file"),
        BibEntry::new(Some("empty".into()), "article").with_field("file", ""),
        BibEntry::new(Some("kept".into()), "article").with_field("file", "/tmp/kept.pdf"),
    ];

    let map = build_file_map(&entries);
    assert_eq!(map.len(), 1);
    let kept = map.get("kept").expect("entry with id and file is kept");
    assert_eq!(kept.path, PathBuf::from("/tmp/kept.pdf"));
    assert!(map.get("nofile").is_none());
}

#[test]
fn test_nonexistent_files_are_still_recorded() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("never-written.pdf");
    let bib = parse_bibliography(&format!(
        "@book{{ghost, title = {{Ghost}}, author = {{Nobody}}, url = {{https://example.org}}, file = {{{}}}}}",
        missing.display()
    ));

    let map = build_file_map(&bib.entries);
    let ghost = map.get("ghost").expect("missing file is still mapped");
    assert_eq!(ghost.path, missing);
    assert_eq!(ghost.meta.title, "Ghost");
    assert_eq!(ghost.meta.authors, "Nobody");
    assert_eq!(ghost.meta.url.as_deref(), Some("https://example.org"));
}

#[test]
fn test_map_keeps_input_order() {
    let bib = parse_bibliography(
        "@misc{z, file = {/z.pdf}}\n@misc{a, file = {/a.pdf}}\n@misc{m, file = {/m.pdf}}\n",
    );
    let ids: Vec<_> = build_file_map(&bib.entries)
        .iter()
        .map(|r| r.bib_id.clone())
        .collect();
    assert_eq!(ids, ["z", "a", "m"]);
}
