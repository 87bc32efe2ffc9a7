//! Client seam for the remote evaluation service and its implementations.

pub mod http;
pub mod mock;

use std::future::Future;
use std::pin::Pin;

use crate::error::ServiceError;
use crate::{CollectionType, DuplicatePair};

pub use http::HttpEvaluationService;
pub use mock::MockService;

/// Boxed future returned by every [`EvaluationService`] call.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// One file ready to go on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadPart {
    pub name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for UploadPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPart")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

/// All files of one submit, sent in a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBatch {
    pub collection_type: CollectionType,
    pub parts: Vec<UploadPart>,
}

impl UploadBatch {
    pub fn names(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.name.clone()).collect()
    }

    pub fn total_bytes(&self) -> usize {
        self.parts.iter().map(|p| p.data.len()).sum()
    }
}

/// The remote service that stores files and scores their similarity.
pub trait EvaluationService: Send + Sync {
    /// Names of the stored files, in the order the service reports them.
    fn list_files(&self) -> ServiceFuture<'_, Vec<String>>;

    /// Send a batch; returns the names the service confirmed as stored.
    fn upload(&self, batch: UploadBatch) -> ServiceFuture<'_, Vec<String>>;

    fn delete_file<'a>(&'a self, name: &'a str) -> ServiceFuture<'a, ()>;

    /// Similar pairs across the whole stored collection.
    fn check_duplicates(&self) -> ServiceFuture<'_, Vec<DuplicatePair>>;
}
