//! Mirror of the filenames the service stores for the active collection.
//!
//! The store never patches a listing locally: a successful delete says
//! nothing about the new contents, so callers list again.

use std::sync::Arc;

use crate::RemoteFile;
use crate::error::{DeleteError, FetchError};
use crate::service::EvaluationService;

#[derive(Clone)]
pub struct CollectionStore {
    service: Arc<dyn EvaluationService>,
}

impl CollectionStore {
    pub fn new(service: Arc<dyn EvaluationService>) -> Self {
        Self { service }
    }

    /// Full re-fetch, in service order.
    pub async fn list(&self) -> Result<Vec<RemoteFile>, FetchError> {
        let names = self.service.list_files().await.map_err(|e| {
            tracing::warn!(error = %e, "file listing failed");
            FetchError::from(e)
        })?;
        tracing::debug!(count = names.len(), "file listing complete");
        Ok(names.into_iter().map(RemoteFile::from).collect())
    }

    pub async fn delete(&self, name: &str) -> Result<(), DeleteError> {
        self.service.delete_file(name).await.map_err(|e| {
            tracing::warn!(name, error = %e, "delete failed");
            DeleteError::from_service(name, e)
        })?;
        tracing::info!(name, "file deleted");
        Ok(())
    }
}
