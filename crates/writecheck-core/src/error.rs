//! Error taxonomy: wire-level [`ServiceError`], one error type per component,
//! and [`WorkflowError`] for everything the controller reports.

use thiserror::Error;

use crate::CollectionType;

/// What went wrong talking to the evaluation service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service could not be reached or the exchange broke off.
    #[error("service unreachable: {0}")]
    Transport(String),
    /// Non-2xx answer other than 404.
    #[error("service rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    /// 2xx answer whose body could not be used.
    #[error("invalid response from service: {0}")]
    InvalidResponse(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("service unreachable: {0}")]
    TransportFailure(String),
    #[error("service rejected the listing (HTTP {status}): {message}")]
    ServiceRejected { status: u16, message: String },
}

impl From<ServiceError> for FetchError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Transport(msg) => FetchError::TransportFailure(msg),
            ServiceError::InvalidResponse(msg) => {
                FetchError::TransportFailure(format!("invalid response: {msg}"))
            }
            ServiceError::Rejected { status, message } => {
                FetchError::ServiceRejected { status, message }
            }
            ServiceError::NotFound { message } => FetchError::ServiceRejected {
                status: 404,
                message,
            },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeleteError {
    #[error("{name} not found: {message}")]
    NotFound { name: String, message: String },
    #[error("service unreachable: {0}")]
    TransportFailure(String),
    #[error("service rejected the delete (HTTP {status}): {message}")]
    ServiceRejected { status: u16, message: String },
}

impl DeleteError {
    pub(crate) fn from_service(name: &str, err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { message } => DeleteError::NotFound {
                name: name.to_string(),
                message,
            },
            ServiceError::Transport(msg) => DeleteError::TransportFailure(msg),
            ServiceError::InvalidResponse(msg) => {
                DeleteError::TransportFailure(format!("invalid response: {msg}"))
            }
            ServiceError::Rejected { status, message } => {
                DeleteError::ServiceRejected { status, message }
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The service refused the batch (type or format).
    #[error("rejected by service: {message}")]
    ValidationRejected { message: String },
    #[error("service unreachable: {0}")]
    TransportFailure(String),
    /// A staged file could not be read; nothing was sent.
    #[error("could not read {name}: {message}")]
    LocalFile { name: String, message: String },
}

impl From<ServiceError> for UploadError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rejected { message, .. } | ServiceError::NotFound { message } => {
                UploadError::ValidationRejected { message }
            }
            ServiceError::Transport(msg) => UploadError::TransportFailure(msg),
            ServiceError::InvalidResponse(msg) => {
                UploadError::TransportFailure(format!("invalid response: {msg}"))
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DuplicateQueryError {
    #[error("service unreachable: {0}")]
    TransportFailure(String),
    #[error("service rejected the check (HTTP {status}): {message}")]
    ServiceRejected { status: u16, message: String },
}

impl From<ServiceError> for DuplicateQueryError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Transport(msg) => DuplicateQueryError::TransportFailure(msg),
            ServiceError::InvalidResponse(msg) => {
                DuplicateQueryError::TransportFailure(format!("invalid response: {msg}"))
            }
            ServiceError::Rejected { status, message } => {
                DuplicateQueryError::ServiceRejected { status, message }
            }
            ServiceError::NotFound { message } => DuplicateQueryError::ServiceRejected {
                status: 404,
                message,
            },
        }
    }
}

/// Errors returned by [`WorkflowController`](crate::WorkflowController)
/// operations. Each one has already been written to the status message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("no acceptable files selected for a {collection_type} collection ({excluded} excluded)")]
    NoFilesSelected {
        collection_type: CollectionType,
        excluded: usize,
    },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("another operation is in progress")]
    Busy,
    #[error("{0} not found in the current collection")]
    NotInCollection(String),
    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),
    #[error("could not fetch file list: {0}")]
    Fetch(#[from] FetchError),
    #[error("delete failed: {0}")]
    Delete(#[from] DeleteError),
    #[error("duplicate check failed: {0}")]
    DuplicateQuery(#[from] DuplicateQueryError),
}
