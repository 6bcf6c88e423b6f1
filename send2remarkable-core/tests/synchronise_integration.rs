use send2remarkable_core::contract::{ClientOutput, MockUploadClient, UploadOutcome};
use send2remarkable_core::error::SyncError;
use send2remarkable_core::synchronise::{synchronise, SynchroniseConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_bib(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("library.bib");
    fs::write(&path, body).expect("write bib");
    path
}

#[tokio::test]
async fn test_synchronise_uploads_pdf_and_prefilters_docx() {
    let tmp = tempdir().unwrap();
    let pdf = tmp.path().join("paper.pdf");
    fs::write(&pdf, b"%PDF-1.4").unwrap();
    let docx = tmp.path().join("missing.docx");

    let bib = write_bib(
        tmp.path(),
        &format!(
            "@article{{paper, title = {{Paper}}, file = {{file:{}:application/pdf}}}}\n\
             @misc{{draft, title = {{Draft}}, file = {{{}}}}}\n",
            pdf.display(),
            docx.display()
        ),
    );

    let mut client = MockUploadClient::new();
    client
        .expect_mkdir()
        .withf(|folder: &str| folder == "/Papers")
        .times(1)
        .returning(|_| Ok(ClientOutput::ok()));
    let expected = pdf.clone();
    client
        .expect_put()
        .withf(move |path: &Path, folder: &str| path == expected && folder == "/Papers")
        .times(1)
        .returning(|_, _| Ok(ClientOutput::ok()));

    let config = SynchroniseConfig {
        bibliography: bib,
        remote_folder: "/Papers".to_string(),
    };
    let report = synchronise(&config, &client)
        .await
        .expect("Synchronise should succeed");

    assert_eq!(report.entries, 2);
    assert_eq!(report.resolved, 2);
    assert_eq!(report.transfer.count(UploadOutcome::Uploaded), 1);
    assert_eq!(report.transfer.count(UploadOutcome::PreFiltered), 1);
    assert_eq!(report.transfer.count(UploadOutcome::Failed), 0);
    assert_eq!(report.transfer.records[0].bib_id, "paper");
    assert_eq!(report.transfer.records[1].bib_id, "draft");
}

#[tokio::test]
async fn test_synchronise_counts_client_failures_and_keeps_going() {
    let tmp = tempdir().unwrap();
    let mut body = String::new();
    for name in ["dup", "broken", "rejected", "fine"] {
        let path = tmp.path().join(format!("{name}.pdf"));
        fs::write(&path, b"%PDF").unwrap();
        body.push_str(&format!("@misc{{{name}, file = {{{}}}}}\n", path.display()));
    }
    body.push_str(&format!(
        "@misc{{gone, file = {{{}}}}}\n",
        tmp.path().join("gone.pdf").display()
    ));
    let bib = write_bib(tmp.path(), &body);

    let mut client = MockUploadClient::new();
    client
        .expect_mkdir()
        .returning(|_| Ok(ClientOutput::failed(1, "Error: entry already exists")));
    client.expect_put().times(4).returning(|path: &Path, _| {
        let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
        match stem.as_str() {
            "dup" => Ok(ClientOutput::failed(1, "Error: entry already exists")),
            "broken" => Ok(ClientOutput::failed(1, "Error: 500 Internal Server Error")),
            "rejected" => Ok(ClientOutput::failed(1, "unsupported file extension")),
            _ => Ok(ClientOutput::ok()),
        }
    });

    let config = SynchroniseConfig {
        bibliography: bib,
        remote_folder: "/Papers".to_string(),
    };
    let report = synchronise(&config, &client).await.unwrap();

    let outcomes: Vec<_> = report.transfer.records.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        [
            UploadOutcome::AlreadyExists,
            UploadOutcome::Failed,
            UploadOutcome::UnsupportedExtension,
            UploadOutcome::Uploaded,
            UploadOutcome::MissingSource,
        ]
    );
    assert_eq!(
        report.transfer.records[1].detail.as_deref(),
        Some("Error: 500 Internal Server Error")
    );
}

#[tokio::test]
async fn test_synchronise_spawn_error_is_counted_as_failure() {
    let tmp = tempdir().unwrap();
    let pdf = tmp.path().join("a.pdf");
    fs::write(&pdf, b"%PDF").unwrap();
    let bib = write_bib(tmp.path(), &format!("@misc{{a, file = {{{}}}}}", pdf.display()));

    let mut client = MockUploadClient::new();
    client
        .expect_put()
        .returning(|_, _| Err("No such file or directory".into()));

    // Root folder: no mkdir expected.
    let config = SynchroniseConfig {
        bibliography: bib,
        remote_folder: "/".to_string(),
    };
    let report = synchronise(&config, &client).await.unwrap();
    assert_eq!(report.transfer.count(UploadOutcome::Failed), 1);
}

#[tokio::test]
async fn test_synchronise_missing_bibliography_is_fatal() {
    let tmp = tempdir().unwrap();
    let client = MockUploadClient::new();
    let config = SynchroniseConfig {
        bibliography: tmp.path().join("nope.bib"),
        remote_folder: "/".to_string(),
    };
    let err = synchronise(&config, &client).await.unwrap_err();
    assert!(matches!(err, SyncError::Bibliography(_)), "got {err:?}");
}
