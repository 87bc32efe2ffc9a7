//! In-memory evaluation service for tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{EvaluationService, ServiceFuture, UploadBatch};
use crate::DuplicatePair;
use crate::error::ServiceError;

#[derive(Default)]
struct MockState {
    files: Vec<String>,
    duplicates: Vec<DuplicatePair>,
    /// Names accepted on the wire but left out of the confirmation.
    unconfirmed: HashSet<String>,
    fail_list: VecDeque<ServiceError>,
    fail_upload: VecDeque<ServiceError>,
    fail_delete: VecDeque<ServiceError>,
    fail_duplicates: VecDeque<ServiceError>,
    batches: Vec<UploadBatch>,
}

/// A hand-rolled fake implementing [`EvaluationService`].
///
/// Behaves like a tiny stateful server:
/// - uploads append names (re-uploading a name keeps one entry),
/// - deletes remove names or answer `NotFound`,
/// - listings return stored names in insertion order,
/// - duplicate checks return whatever was configured.
///
/// Failures can be queued per operation; each queued error is returned once.
/// Every call is counted, and an optional delay simulates latency.
pub struct MockService {
    state: Mutex<MockState>,
    delay: Option<Duration>,
    list_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    duplicate_calls: AtomicUsize,
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            delay: None,
            list_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            duplicate_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_files<I, S>(self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().unwrap().files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_duplicates(self, pairs: Vec<DuplicatePair>) -> Self {
        self.set_duplicates(pairs);
        self
    }

    /// Sleep this long before answering any call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_duplicates(&self, pairs: Vec<DuplicatePair>) {
        self.state.lock().unwrap().duplicates = pairs;
    }

    /// Store `name` on upload but omit it from the confirmation.
    pub fn leave_unconfirmed(&self, name: &str) {
        self.state.lock().unwrap().unconfirmed.insert(name.to_string());
    }

    /// Remove a stored name behind the client's back.
    pub fn remove_server_side(&self, name: &str) {
        self.state.lock().unwrap().files.retain(|f| f != name);
    }

    pub fn fail_next_list(&self, err: ServiceError) {
        self.state.lock().unwrap().fail_list.push_back(err);
    }

    pub fn fail_next_upload(&self, err: ServiceError) {
        self.state.lock().unwrap().fail_upload.push_back(err);
    }

    pub fn fail_next_delete(&self, err: ServiceError) {
        self.state.lock().unwrap().fail_delete.push_back(err);
    }

    pub fn fail_next_duplicates(&self, err: ServiceError) {
        self.state.lock().unwrap().fail_duplicates.push_back(err);
    }

    /// Names currently stored.
    pub fn stored(&self) -> Vec<String> {
        self.state.lock().unwrap().files.clone()
    }

    /// Every batch received, oldest first.
    pub fn batches(&self) -> Vec<UploadBatch> {
        self.state.lock().unwrap().batches.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn duplicate_calls(&self) -> usize {
        self.duplicate_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

impl EvaluationService for MockService {
    fn list_files(&self) -> ServiceFuture<'_, Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.pause().await;
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.fail_list.pop_front() {
                return Err(err);
            }
            Ok(state.files.clone())
        })
    }

    fn upload(&self, batch: UploadBatch) -> ServiceFuture<'_, Vec<String>> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.pause().await;
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.fail_upload.pop_front() {
                return Err(err);
            }
            if batch.parts.is_empty() {
                return Err(ServiceError::Rejected {
                    status: 400,
                    message: "No file part".into(),
                });
            }
            let mut confirmed = Vec::new();
            for name in batch.names() {
                if !state.files.contains(&name) {
                    state.files.push(name.clone());
                }
                if !state.unconfirmed.contains(&name) {
                    confirmed.push(name);
                }
            }
            state.batches.push(batch);
            Ok(confirmed)
        })
    }

    fn delete_file<'a>(&'a self, name: &'a str) -> ServiceFuture<'a, ()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.pause().await;
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.fail_delete.pop_front() {
                return Err(err);
            }
            let before = state.files.len();
            state.files.retain(|f| f != name);
            if state.files.len() == before {
                return Err(ServiceError::NotFound {
                    message: "not found".into(),
                });
            }
            Ok(())
        })
    }

    fn check_duplicates(&self) -> ServiceFuture<'_, Vec<DuplicatePair>> {
        self.duplicate_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.pause().await;
            let mut state = self.state.lock().unwrap();
            if let Some(err) = state.fail_duplicates.pop_front() {
                return Err(err);
            }
            Ok(state.duplicates.clone())
        })
    }
}
