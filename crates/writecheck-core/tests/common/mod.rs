//! In-process stand-in for the evaluation service, served by axum on an
//! ephemeral port.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;

/// One received multipart file part.
#[derive(Debug, Clone)]
pub struct ReceivedPart {
    pub file_name: String,
    pub content_type: String,
    pub len: usize,
}

#[derive(Default)]
pub struct FakeState {
    pub files: Vec<String>,
    pub duplicates: Vec<(String, String, f64)>,
    /// `collection_type` field of every upload request.
    pub upload_types: Vec<String>,
    pub upload_parts: Vec<Vec<ReceivedPart>>,
    /// Answer `/files` with a non-JSON 200 body.
    pub garbage_listing: bool,
    /// Answer every 2xx route with JSON that lacks the expected key.
    pub keyless: bool,
    /// Answer `/check_duplicates` with this status and no JSON body.
    pub duplicates_status: Option<u16>,
    pub delay: Option<Duration>,
    pub requests: usize,
}

pub type Shared = Arc<Mutex<FakeState>>;

pub fn state_with_files(files: &[&str]) -> Shared {
    Arc::new(Mutex::new(FakeState {
        files: files.iter().map(|f| f.to_string()).collect(),
        ..Default::default()
    }))
}

async fn settle(state: &Shared) {
    let delay = {
        let mut s = state.lock().unwrap();
        s.requests += 1;
        s.delay
    };
    if let Some(d) = delay {
        tokio::time::sleep(d).await;
    }
}

fn keyless_body() -> Response {
    Json(json!({ "message": "maintenance" })).into_response()
}

async fn list(State(state): State<Shared>) -> Response {
    settle(&state).await;
    let s = state.lock().unwrap();
    if s.keyless {
        return keyless_body();
    }
    if s.garbage_listing {
        return (StatusCode::OK, "<html>oops</html>").into_response();
    }
    Json(json!({ "files": s.files })).into_response()
}

async fn upload(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    settle(&state).await;
    if state.lock().unwrap().keyless {
        return keyless_body();
    }
    let mut parts = Vec::new();
    let mut collection_type = String::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "files" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
                parts.push(ReceivedPart {
                    file_name,
                    content_type,
                    len,
                });
            }
            "collection_type" => {
                collection_type = field.text().await.unwrap_or_default();
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    if parts.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No file part" })),
        )
            .into_response();
    }
    if let Some(bad) = parts.iter().find(|p| p.file_name.ends_with(".exe")) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("unsupported file type: {}", bad.file_name) })),
        )
            .into_response();
    }

    let mut s = state.lock().unwrap();
    let mut accepted = Vec::new();
    for part in &parts {
        // Empty files are stored but not confirmed.
        if part.len == 0 {
            continue;
        }
        if !s.files.contains(&part.file_name) {
            s.files.push(part.file_name.clone());
        }
        accepted.push(part.file_name.clone());
    }
    s.upload_types.push(collection_type);
    s.upload_parts.push(parts);
    Json(json!({ "message": "Files received successfully", "files": accepted })).into_response()
}

async fn remove(State(state): State<Shared>, Path(name): Path<String>) -> Response {
    settle(&state).await;
    let mut s = state.lock().unwrap();
    let before = s.files.len();
    s.files.retain(|f| *f != name);
    if s.files.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response();
    }
    Json(json!({ "message": format!("deleted {name}") })).into_response()
}

async fn duplicates(State(state): State<Shared>) -> Response {
    settle(&state).await;
    let s = state.lock().unwrap();
    if s.keyless {
        return keyless_body();
    }
    if let Some(code) = s.duplicates_status {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "backend exploded").into_response();
    }
    Json(json!({ "duplicates": s.duplicates })).into_response()
}

/// Serve the fake on 127.0.0.1 and return its base URL.
pub async fn spawn(state: Shared) -> String {
    let app = Router::new()
        .route("/files", get(list))
        .route("/upload", post(upload))
        .route("/delete/{name}", delete(remove))
        .route("/check_duplicates", get(duplicates))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
