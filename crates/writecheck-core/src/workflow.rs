//! The workflow controller: sole owner and writer of [`WorkflowState`].
//!
//! State lives in a `watch` channel. The controller holds the only sender,
//! presentation holds receivers. Each transition is one `send_modify`, so a
//! reader never sees `files` from one operation next to `duplicates` from a
//! half-applied other one.
//!
//! Serialization rules:
//! - upload, delete and refresh are mutually exclusive (`busy`);
//! - a duplicate check neither starts nor is started over them;
//! - a second submit while anything is in flight is a no-op.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::collection::CollectionStore;
use crate::duplicates::DuplicateReportEngine;
use crate::error::{FetchError, WorkflowError};
use crate::filter::{self, ExclusionPolicy};
use crate::service::EvaluationService;
use crate::transfer::{TransferCoordinator, UploadResult};
use crate::{CollectionType, Config, DuplicatePair, RemoteFile, StagedFile};

/// What the controller is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Deleting,
    /// Re-listing after a mutation, or on request.
    Refreshing,
    CheckingDuplicates,
}

/// The single snapshot presentation reads.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    pub collection_type: CollectionType,
    pub staged: Vec<StagedFile>,
    /// Result of the last successful listing, never patched locally.
    pub files: Vec<RemoteFile>,
    /// Result of the last successful duplicate check.
    pub duplicates: Vec<DuplicatePair>,
    pub status_message: String,
    /// An upload, delete or refresh is in flight.
    pub busy: bool,
    pub phase: Phase,
    pub last_upload: Option<UploadResult>,
}

impl WorkflowState {
    fn new(collection_type: CollectionType) -> Self {
        Self {
            collection_type,
            staged: Vec::new(),
            files: Vec::new(),
            duplicates: Vec::new(),
            status_message: collection_type.hint(),
            busy: false,
            phase: Phase::Idle,
            last_upload: None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.name == name)
    }

    fn begin(&mut self, phase: Phase, status: String) {
        self.busy = phase != Phase::CheckingDuplicates;
        self.phase = phase;
        self.status_message = status;
    }

    fn finish(&mut self, status: String) {
        self.busy = false;
        self.phase = Phase::Idle;
        self.status_message = status;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Uploaded(UploadResult),
    /// Something was already in flight; no request was made.
    AlreadyBusy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Found(usize),
    NoneFound,
    /// A check was already in flight; no request was made.
    AlreadyRunning,
}

/// Drives uploads, deletes, listings and duplicate checks for one session.
pub struct WorkflowController {
    state: watch::Sender<WorkflowState>,
    store: CollectionStore,
    transfer: TransferCoordinator,
    reports: DuplicateReportEngine,
    exclusion_policy: ExclusionPolicy,
}

impl WorkflowController {
    /// Build a controller without touching the network.
    pub fn new(service: Arc<dyn EvaluationService>, config: &Config) -> Self {
        let (state, _) = watch::channel(WorkflowState::new(config.default_type));
        Self {
            state,
            store: CollectionStore::new(Arc::clone(&service)),
            transfer: TransferCoordinator::new(Arc::clone(&service)),
            reports: DuplicateReportEngine::new(service),
            exclusion_policy: config.exclusion_policy,
        }
    }

    /// Build a controller and fetch the initial listing. A failed fetch is
    /// left in the status message with an empty file list.
    pub async fn start(service: Arc<dyn EvaluationService>, config: &Config) -> Self {
        let controller = Self::new(service, config);
        if let Err(e) = controller.refresh_collection().await {
            tracing::warn!(error = %e, "initial listing failed");
        }
        controller
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    pub fn exclusion_policy(&self) -> ExclusionPolicy {
        self.exclusion_policy
    }

    /// Switch collection type. Drops the staged selection; the remote
    /// collection is left alone.
    pub fn set_type(&self, collection_type: CollectionType) {
        self.state.send_modify(|s| {
            s.collection_type = collection_type;
            s.staged.clear();
            s.status_message = collection_type.hint();
        });
        tracing::debug!(%collection_type, "collection type set");
    }

    /// Stage the files acceptable for the current type, replacing any
    /// previous selection. Returns how many were staged.
    pub fn select_files(&self, files: Vec<StagedFile>) -> Result<usize, WorkflowError> {
        let policy = self.exclusion_policy;
        let mut result = Ok(0);
        self.state.send_modify(|s| {
            let selection = filter::partition(s.collection_type, files);
            if policy == ExclusionPolicy::Report {
                for file in &selection.excluded {
                    tracing::warn!(
                        name = %file.name,
                        collection_type = %s.collection_type,
                        "file excluded from selection"
                    );
                }
            }

            if selection.accepted.is_empty() {
                let err = WorkflowError::NoFilesSelected {
                    collection_type: s.collection_type,
                    excluded: selection.excluded.len(),
                };
                s.staged.clear();
                s.status_message = capitalize(&err.to_string());
                result = Err(err);
                return;
            }

            s.status_message = selection_status(
                s.collection_type,
                selection.accepted.len(),
                &selection.excluded,
                policy,
            );
            result = Ok(selection.accepted.len());
            s.staged = selection.accepted;
        });
        result
    }

    /// Send the staged files as one batch, then re-list on success.
    ///
    /// The staged selection is consumed whatever the outcome.
    pub async fn submit_upload(&self) -> Result<SubmitOutcome, WorkflowError> {
        enum Gate {
            Busy,
            Empty,
            Go(Vec<StagedFile>, CollectionType),
        }

        let mut gate = Gate::Busy;
        self.state.send_if_modified(|s| {
            if s.phase != Phase::Idle {
                return false;
            }
            if s.staged.is_empty() {
                s.status_message = "Please select at least one file before uploading".into();
                gate = Gate::Empty;
                return true;
            }
            let staged = std::mem::take(&mut s.staged);
            s.begin(
                Phase::Uploading,
                format!("Uploading {}...", plural(staged.len(), "file")),
            );
            gate = Gate::Go(staged, s.collection_type);
            true
        });

        let (staged, collection_type) = match gate {
            Gate::Busy => {
                tracing::debug!("upload requested while busy, ignoring");
                return Ok(SubmitOutcome::AlreadyBusy);
            }
            Gate::Empty => {
                return Err(WorkflowError::InvalidState(
                    "nothing is staged for upload".into(),
                ));
            }
            Gate::Go(staged, collection_type) => (staged, collection_type),
        };

        let result = match self.transfer.upload(staged, collection_type).await {
            Ok(result) => result,
            Err(e) => {
                let err = WorkflowError::from(e);
                self.state
                    .send_modify(|s| s.finish(capitalize(&err.to_string())));
                return Err(err);
            }
        };

        let mut uploaded = upload_status(&result);
        self.state.send_modify(|s| {
            s.last_upload = Some(result.clone());
            s.begin(Phase::Refreshing, format!("{uploaded}; refreshing file list..."));
        });

        let listing = self.store.list().await;
        self.state.send_modify(|s| {
            if let Err(e) = apply_listing(s, listing) {
                uploaded = format!("{uploaded}, but the file list could not be refreshed: {e}");
            }
            s.finish(uploaded);
        });
        Ok(SubmitOutcome::Uploaded(result))
    }

    /// Re-fetch the listing. On failure the previous listing stays visible.
    pub async fn refresh_collection(&self) -> Result<(), WorkflowError> {
        if !self.try_begin(Phase::Refreshing, "Refreshing file list...".into()) {
            return Err(WorkflowError::Busy);
        }

        let listing = self.store.list().await;
        let mut outcome = Ok(());
        self.state.send_modify(|s| match apply_listing(s, listing) {
            Ok(count) => s.finish(format!("{} in collection", plural(count, "file"))),
            Err(e) => {
                let err = WorkflowError::from(e);
                s.finish(capitalize(&err.to_string()));
                outcome = Err(err);
            }
        });
        outcome
    }

    /// Delete `name` on the service, then re-list. On failure the listing is
    /// left untouched.
    pub async fn delete_file(&self, name: &str) -> Result<(), WorkflowError> {
        let mut outcome = Err(WorkflowError::Busy);
        self.state.send_if_modified(|s| {
            if s.phase != Phase::Idle {
                return false;
            }
            if !s.contains(name) {
                let err = WorkflowError::NotInCollection(name.to_string());
                s.status_message = capitalize(&err.to_string());
                outcome = Err(err);
                return true;
            }
            s.begin(Phase::Deleting, format!("Deleting {name}..."));
            outcome = Ok(());
            true
        });
        outcome?;

        if let Err(e) = self.store.delete(name).await {
            let err = WorkflowError::from(e);
            self.state
                .send_modify(|s| s.finish(capitalize(&err.to_string())));
            return Err(err);
        }

        self.state.send_modify(|s| {
            s.begin(Phase::Refreshing, format!("Deleted {name}; refreshing file list..."))
        });
        let listing = self.store.list().await;
        self.state.send_modify(|s| {
            let status = match apply_listing(s, listing) {
                Ok(_) => format!("Deleted {name}"),
                Err(e) => format!("Deleted {name}, but the file list could not be refreshed: {e}"),
            };
            s.finish(status);
        });
        Ok(())
    }

    /// Run a duplicate check and replace the previous result wholesale.
    /// On failure the previous result stays.
    pub async fn query_duplicates(&self) -> Result<CheckOutcome, WorkflowError> {
        let mut gate: Result<bool, WorkflowError> = Ok(false);
        self.state.send_if_modified(|s| match s.phase {
            Phase::Idle => {
                s.begin(Phase::CheckingDuplicates, "Checking for duplicates...".into());
                gate = Ok(true);
                true
            }
            Phase::CheckingDuplicates => false,
            _ => {
                gate = Err(WorkflowError::Busy);
                false
            }
        });
        if !gate? {
            tracing::debug!("duplicate check already running, ignoring");
            return Ok(CheckOutcome::AlreadyRunning);
        }

        let report = self.reports.check_duplicates().await;
        let mut outcome = Ok(CheckOutcome::NoneFound);
        self.state.send_modify(|s| match report {
            Ok(pairs) => {
                let status = if pairs.is_empty() {
                    outcome = Ok(CheckOutcome::NoneFound);
                    "No duplicates found".to_string()
                } else {
                    outcome = Ok(CheckOutcome::Found(pairs.len()));
                    format!("Found {}", plural(pairs.len(), "likely duplicate pair"))
                };
                s.duplicates = pairs;
                s.finish(status);
            }
            Err(e) => {
                let err = WorkflowError::from(e);
                s.finish(capitalize(&err.to_string()));
                outcome = Err(err);
            }
        });
        outcome
    }

    /// Enter `phase` if idle. Returns false, changing nothing, otherwise.
    fn try_begin(&self, phase: Phase, status: String) -> bool {
        self.state.send_if_modified(|s| {
            if s.phase != Phase::Idle {
                return false;
            }
            s.begin(phase, status);
            true
        })
    }
}

/// Replace `files` with a fresh listing, or keep the old one on failure.
fn apply_listing(
    state: &mut WorkflowState,
    listing: Result<Vec<RemoteFile>, FetchError>,
) -> Result<usize, FetchError> {
    let files = listing?;
    let count = files.len();
    state.files = files;
    Ok(count)
}

fn selection_status(
    collection_type: CollectionType,
    accepted: usize,
    excluded: &[StagedFile],
    policy: ExclusionPolicy,
) -> String {
    let selected = format!("Selected {}", plural(accepted, "file"));
    if excluded.is_empty() {
        return selected;
    }
    match policy {
        ExclusionPolicy::Silent => format!(
            "{selected} ({} excluded, not accepted for {collection_type} collections)",
            excluded.len()
        ),
        ExclusionPolicy::Report => format!(
            "{selected}; excluded {} (not accepted for {collection_type} collections)",
            excluded
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn upload_status(result: &UploadResult) -> String {
    let mut status = format!("Uploaded {}", plural(result.accepted.len(), "file"));
    if result.is_partial() {
        status.push_str(&format!(
            " (not confirmed: {})",
            result.unconfirmed.join(", ")
        ));
    }
    status
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
