//! End-to-end workflow scenarios over HTTP.

mod common;

use std::io::Write;
use std::sync::Arc;

use writecheck_core::{
    CheckOutcome, CollectionType, Config, DeleteError, DuplicatePair, DuplicateQueryError,
    FetchError, HttpEvaluationService, Phase, RemoteFile, StagedFile, SubmitOutcome,
    WorkflowController, WorkflowError,
};

async fn session(base_url: String) -> WorkflowController {
    let config = Config {
        base_url,
        ..Config::default()
    };
    let svc = HttpEvaluationService::from_config(&config).unwrap();
    WorkflowController::start(Arc::new(svc), &config).await
}

#[tokio::test]
async fn select_upload_and_list() {
    let state = common::state_with_files(&[]);
    let ctl = session(common::spawn(state.clone()).await).await;
    assert!(ctl.snapshot().files.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("a.pdf");
    std::fs::File::create(&pdf)
        .unwrap()
        .write_all(b"%PDF-1.4 essay")
        .unwrap();
    let txt = dir.path().join("b.txt");
    std::fs::write(&txt, "notes").unwrap();

    ctl.set_type(CollectionType::Text);
    let staged = ctl
        .select_files(vec![StagedFile::from_path(&pdf), StagedFile::from_path(&txt)])
        .unwrap();
    assert_eq!(staged, 1);
    assert_eq!(ctl.snapshot().staged[0].name, "a.pdf");

    let outcome = ctl.submit_upload().await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Uploaded(ref r) if r.accepted == ["a.pdf"]));

    let snap = ctl.snapshot();
    assert_eq!(snap.files, vec![RemoteFile { name: "a.pdf".into() }]);
    assert_eq!(snap.phase, Phase::Idle);
    assert!(!snap.busy);

    let s = state.lock().unwrap();
    assert_eq!(s.upload_types, ["text"]);
    assert_eq!(s.upload_parts[0][0].content_type, "application/pdf");
}

#[tokio::test]
async fn empty_file_is_stored_but_unconfirmed() {
    let state = common::state_with_files(&[]);
    let ctl = session(common::spawn(state).await).await;

    ctl.select_files(vec![
        StagedFile::in_memory("full.pdf", b"%PDF".to_vec()),
        StagedFile::in_memory("empty.pdf", Vec::new()),
    ])
    .unwrap();
    let outcome = ctl.submit_upload().await.unwrap();

    let SubmitOutcome::Uploaded(result) = outcome else {
        panic!("expected an upload");
    };
    assert_eq!(result.accepted, ["full.pdf"]);
    assert_eq!(result.unconfirmed, ["empty.pdf"]);
    assert!(ctl.snapshot().status_message.contains("not confirmed: empty.pdf"));
}

#[tokio::test]
async fn duplicate_report_is_applied_verbatim() {
    let state = common::state_with_files(&["a.pdf", "b.pdf"]);
    state.lock().unwrap().duplicates = vec![("a.pdf".into(), "b.pdf".into(), 0.87)];
    let ctl = session(common::spawn(state).await).await;

    assert_eq!(ctl.query_duplicates().await, Ok(CheckOutcome::Found(1)));

    let snap = ctl.snapshot();
    assert_eq!(
        snap.duplicates,
        vec![DuplicatePair::new("a.pdf", "b.pdf", 0.87)]
    );
    assert_ne!(snap.status_message, "No duplicates found");
}

#[tokio::test]
async fn delete_missing_file_keeps_listing() {
    let state = common::state_with_files(&["a.pdf", "missing.pdf"]);
    let ctl = session(common::spawn(state.clone()).await).await;
    // Someone else removed it after our listing.
    state.lock().unwrap().files.retain(|f| f != "missing.pdf");

    let err = ctl.delete_file("missing.pdf").await.unwrap_err();
    assert!(matches!(err, WorkflowError::Delete(DeleteError::NotFound { .. })));

    let snap = ctl.snapshot();
    assert_eq!(snap.files.len(), 2);
    assert!(snap.status_message.contains("not found"));
}

#[tokio::test]
async fn keyless_answers_keep_previous_snapshots() {
    let state = common::state_with_files(&["a.pdf", "b.pdf"]);
    state.lock().unwrap().duplicates = vec![("a.pdf".into(), "b.pdf".into(), 0.93)];
    let ctl = session(common::spawn(state.clone()).await).await;
    assert_eq!(ctl.query_duplicates().await, Ok(CheckOutcome::Found(1)));

    state.lock().unwrap().keyless = true;

    let err = ctl.refresh_collection().await.unwrap_err();
    assert!(matches!(err, WorkflowError::Fetch(FetchError::TransportFailure(_))), "{err:?}");
    let err = ctl.query_duplicates().await.unwrap_err();
    assert!(
        matches!(err, WorkflowError::DuplicateQuery(DuplicateQueryError::TransportFailure(_))),
        "{err:?}"
    );

    let snap = ctl.snapshot();
    assert_eq!(
        snap.files,
        vec![RemoteFile { name: "a.pdf".into() }, RemoteFile { name: "b.pdf".into() }]
    );
    assert_eq!(snap.duplicates, vec![DuplicatePair::new("a.pdf", "b.pdf", 0.93)]);
    assert_ne!(snap.status_message, "No duplicates found");
    assert_eq!(snap.phase, Phase::Idle);
}

#[tokio::test]
async fn submit_with_nothing_staged_sends_nothing() {
    let state = common::state_with_files(&[]);
    let ctl = session(common::spawn(state.clone()).await).await;
    let before = state.lock().unwrap().requests;

    let err = ctl.submit_upload().await.unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState(_)));
    assert_eq!(state.lock().unwrap().requests, before);
}

#[tokio::test]
async fn unreachable_service_leaves_session_idle() {
    let ctl = session(common::dead_url().await).await;
    let snap = ctl.snapshot();
    assert!(snap.files.is_empty());
    assert!(snap.status_message.starts_with("Could not fetch file list"));
    assert_eq!(snap.phase, Phase::Idle);

    let err = ctl.query_duplicates().await.unwrap_err();
    assert!(matches!(err, WorkflowError::DuplicateQuery(_)));
    assert_eq!(ctl.snapshot().phase, Phase::Idle);

    ctl.select_files(vec![StagedFile::in_memory("a.pdf", b"%PDF".to_vec())])
        .unwrap();
    let err = ctl.submit_upload().await.unwrap_err();
    assert!(matches!(err, WorkflowError::Upload(_)));
    assert!(!ctl.snapshot().busy);
}
