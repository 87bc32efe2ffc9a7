//! On-demand similarity report for the whole stored collection.

use std::sync::Arc;

use crate::DuplicatePair;
use crate::error::DuplicateQueryError;
use crate::service::EvaluationService;

#[derive(Clone)]
pub struct DuplicateReportEngine {
    service: Arc<dyn EvaluationService>,
}

impl DuplicateReportEngine {
    pub fn new(service: Arc<dyn EvaluationService>) -> Self {
        Self { service }
    }

    /// Ask the service for similar pairs. The input is implicitly the full
    /// server-side collection; pairs come back in service order.
    pub async fn check_duplicates(&self) -> Result<Vec<DuplicatePair>, DuplicateQueryError> {
        let pairs = self.service.check_duplicates().await.map_err(|e| {
            tracing::warn!(error = %e, "duplicate check failed");
            DuplicateQueryError::from(e)
        })?;
        tracing::info!(pairs = pairs.len(), "duplicate check complete");
        Ok(pairs)
    }
}
