use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{EvaluationService, ServiceFuture, UploadBatch};
use crate::error::ServiceError;
use crate::{Config, DuplicatePair};

const USER_AGENT: &str = concat!("writecheck/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct FileList {
    files: Vec<String>,
}

#[derive(Deserialize)]
struct DuplicateList {
    duplicates: Vec<(String, String, f64)>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`EvaluationService`] over HTTP/JSON.
pub struct HttpEvaluationService {
    base_url: String,
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpEvaluationService {
    /// Build a client for `config.base_url` with the configured timeouts.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ServiceError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(&config.base_url, client).with_timeout(config.timeout()))
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn prepare(&self, req: RequestBuilder) -> RequestBuilder {
        match self.timeout {
            Some(t) => req.timeout(t),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ServiceError> {
        let resp = self.prepare(req).send().await.map_err(transport)?;
        check_status(resp).await
    }
}

fn transport(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Transport(format!("request timed out: {err}"))
    } else {
        ServiceError::Transport(err.to_string())
    }
}

fn decode(err: reqwest::Error) -> ServiceError {
    if err.is_decode() {
        ServiceError::InvalidResponse(err.to_string())
    } else {
        transport(err)
    }
}

/// Pass 2xx responses through; turn anything else into a [`ServiceError`]
/// using the `{ "error": ... }` body when there is one.
async fn check_status(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .map(|b| b.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    if status == StatusCode::NOT_FOUND {
        Err(ServiceError::NotFound { message })
    } else {
        Err(ServiceError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn into_pairs(raw: Vec<(String, String, f64)>) -> Result<Vec<DuplicatePair>, ServiceError> {
    raw.into_iter()
        .map(|(a, b, score)| {
            if score.is_finite() && (0.0..=1.0).contains(&score) {
                Ok(DuplicatePair::new(a, b, score))
            } else {
                Err(ServiceError::InvalidResponse(format!(
                    "score {score} for ({a}, {b}) is outside [0, 1]"
                )))
            }
        })
        .collect()
}

impl EvaluationService for HttpEvaluationService {
    fn list_files(&self) -> ServiceFuture<'_, Vec<String>> {
        Box::pin(async move {
            let url = self.url("files");
            tracing::debug!(%url, "listing files");
            let resp = self.send(self.client.get(&url)).await?;
            let body: FileList = resp.json().await.map_err(decode)?;
            Ok(body.files)
        })
    }

    fn upload(&self, batch: UploadBatch) -> ServiceFuture<'_, Vec<String>> {
        Box::pin(async move {
            let url = self.url("upload");
            tracing::debug!(
                %url,
                files = batch.parts.len(),
                bytes = batch.total_bytes(),
                collection_type = %batch.collection_type,
                "uploading batch"
            );

            let mut form = Form::new().text("collection_type", batch.collection_type.as_str());
            for part in batch.parts {
                let name = part.name;
                let file = Part::bytes(part.data)
                    .file_name(name.clone())
                    .mime_str(&part.mime)
                    .map_err(|e| {
                        ServiceError::Transport(format!("could not encode {name}: {e}"))
                    })?;
                form = form.part("files", file);
            }

            let resp = self.send(self.client.post(&url).multipart(form)).await?;
            let body: FileList = resp.json().await.map_err(decode)?;
            Ok(body.files)
        })
    }

    fn delete_file<'a>(&'a self, name: &'a str) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let url = self.url(&format!("delete/{}", urlencoding::encode(name)));
            tracing::debug!(%url, "deleting file");
            self.send(self.client.delete(&url)).await?;
            Ok(())
        })
    }

    fn check_duplicates(&self) -> ServiceFuture<'_, Vec<DuplicatePair>> {
        Box::pin(async move {
            let url = self.url("check_duplicates");
            tracing::debug!(%url, "checking duplicates");
            let resp = self.send(self.client.get(&url)).await?;
            let body: DuplicateList = resp.json().await.map_err(decode)?;
            into_pairs(body.duplicates)
        })
    }
}
