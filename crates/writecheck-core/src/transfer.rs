//! One batch upload per submit.
//!
//! All staged files travel in a single request so the service can confirm a
//! subset. There is no retry: a failed batch is reported and the user decides
//! whether to send it again.

use std::sync::Arc;

use serde::Serialize;

use crate::error::UploadError;
use crate::filter::mime_for;
use crate::service::{EvaluationService, UploadBatch, UploadPart};
use crate::{CollectionType, FileContent, StagedFile};

/// Outcome of a batch the service answered with 2xx.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    /// Names the service confirmed as stored.
    pub accepted: Vec<String>,
    /// Names that were sent but are missing from the confirmation.
    pub unconfirmed: Vec<String>,
}

impl UploadResult {
    pub fn is_partial(&self) -> bool {
        !self.unconfirmed.is_empty()
    }
}

#[derive(Clone)]
pub struct TransferCoordinator {
    service: Arc<dyn EvaluationService>,
}

impl TransferCoordinator {
    pub fn new(service: Arc<dyn EvaluationService>) -> Self {
        Self { service }
    }

    /// Read every staged file and send them together.
    ///
    /// An unreadable file aborts the batch before any request is made.
    pub async fn upload(
        &self,
        files: Vec<StagedFile>,
        collection_type: CollectionType,
    ) -> Result<UploadResult, UploadError> {
        if files.is_empty() {
            return Ok(UploadResult::default());
        }

        let mut parts = Vec::with_capacity(files.len());
        for file in files {
            let mime = mime_for(&file);
            let data = match file.content {
                FileContent::Bytes(data) => data,
                FileContent::Path(ref path) => {
                    tokio::fs::read(path)
                        .await
                        .map_err(|e| UploadError::LocalFile {
                            name: file.name.clone(),
                            message: e.to_string(),
                        })?
                }
            };
            parts.push(UploadPart {
                name: file.name,
                mime,
                data,
            });
        }

        let batch = UploadBatch {
            collection_type,
            parts,
        };
        let sent = batch.names();
        let total_bytes = batch.total_bytes();

        let accepted = self.service.upload(batch).await.map_err(|e| {
            tracing::warn!(files = sent.len(), error = %e, "upload failed");
            UploadError::from(e)
        })?;

        let unconfirmed: Vec<String> = sent
            .into_iter()
            .filter(|name| !accepted.contains(name))
            .collect();
        tracing::info!(
            accepted = accepted.len(),
            unconfirmed = unconfirmed.len(),
            bytes = total_bytes,
            "upload complete"
        );
        Ok(UploadResult {
            accepted,
            unconfirmed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::service::MockService;
    use std::io::Write;

    #[tokio::test]
    async fn whole_batch_goes_in_one_request() {
        let mock = Arc::new(MockService::new());
        let coordinator = TransferCoordinator::new(mock.clone());

        let result = coordinator
            .upload(
                vec![
                    StagedFile::in_memory("a.pdf", b"%PDF-1.4 a".to_vec()),
                    StagedFile::in_memory("b.docx", b"PK b".to_vec()),
                ],
                CollectionType::Text,
            )
            .await
            .unwrap();

        assert_eq!(result.accepted, ["a.pdf", "b.docx"]);
        assert!(!result.is_partial());
        assert_eq!(mock.upload_calls(), 1);

        let batch = &mock.batches()[0];
        assert_eq!(batch.collection_type, CollectionType::Text);
        assert_eq!(batch.parts[0].mime, "application/pdf");
        assert_eq!(batch.parts[1].data, b"PK b");
    }

    #[tokio::test]
    async fn subset_confirmation_is_partial_success() {
        let mock = Arc::new(MockService::new());
        mock.leave_unconfirmed("b.pdf");
        let coordinator = TransferCoordinator::new(mock.clone());

        let result = coordinator
            .upload(
                vec![
                    StagedFile::in_memory("a.pdf", vec![1]),
                    StagedFile::in_memory("b.pdf", vec![2]),
                ],
                CollectionType::Text,
            )
            .await
            .unwrap();

        assert_eq!(result.accepted, ["a.pdf"]);
        assert_eq!(result.unconfirmed, ["b.pdf"]);
        assert!(result.is_partial());
    }

    #[tokio::test]
    async fn files_on_disk_are_read_at_send_time() {
        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        tmp.write_all(b"\x89PNG fake").unwrap();

        let mock = Arc::new(MockService::new());
        let coordinator = TransferCoordinator::new(mock.clone());
        let staged = StagedFile::from_path(tmp.path());
        let name = staged.name.clone();

        let result = coordinator
            .upload(vec![staged], CollectionType::Handwritten)
            .await
            .unwrap();
        assert_eq!(result.accepted, [name]);

        let part = &mock.batches()[0].parts[0];
        assert_eq!(part.mime, "image/png");
        assert_eq!(part.data, b"\x89PNG fake");
    }

    #[tokio::test]
    async fn unreadable_file_sends_nothing() {
        let mock = Arc::new(MockService::new());
        let coordinator = TransferCoordinator::new(mock.clone());

        let err = coordinator
            .upload(
                vec![StagedFile::from_path("/definitely/not/here.pdf")],
                CollectionType::Text,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::LocalFile { ref name, .. } if name == "here.pdf"));
        assert_eq!(mock.upload_calls(), 0);
    }

    #[tokio::test]
    async fn rejection_carries_server_message_and_is_not_retried() {
        let mock = Arc::new(MockService::new());
        mock.fail_next_upload(ServiceError::Rejected {
            status: 415,
            message: "unsupported format".into(),
        });
        let coordinator = TransferCoordinator::new(mock.clone());

        let err = coordinator
            .upload(
                vec![StagedFile::in_memory("a.pdf", vec![1])],
                CollectionType::Text,
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            UploadError::ValidationRejected {
                message: "unsupported format".into()
            }
        );
        assert_eq!(mock.upload_calls(), 1);
        assert!(mock.stored().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let mock = Arc::new(MockService::new());
        let coordinator = TransferCoordinator::new(mock.clone());
        let result = coordinator.upload(vec![], CollectionType::Text).await.unwrap();
        assert_eq!(result, UploadResult::default());
        assert_eq!(mock.upload_calls(), 0);
    }
}
