//! Client-side acceptance rules per collection type.
//!
//! This is a convenience filter only. The evaluation service applies its own
//! rules and its answer is authoritative.

use serde::{Deserialize, Serialize};

use crate::{CollectionType, StagedFile};

/// Extensions accepted for [`CollectionType::Text`].
pub const TEXT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];

/// Image extensions recognised when no MIME type was declared.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp", "heic",
];

const TEXT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

const OCTET_STREAM: &str = "application/octet-stream";

/// How excluded files are reported by `select_files`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionPolicy {
    /// Only the number of excluded files is mentioned.
    #[default]
    Silent,
    /// Every excluded file is named and logged.
    Report,
}

/// Result of splitting a selection into accepted and excluded files.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub accepted: Vec<StagedFile>,
    pub excluded: Vec<StagedFile>,
}

/// Whether `file` belongs in a collection of type `collection_type`.
pub fn accepts(collection_type: CollectionType, file: &StagedFile) -> bool {
    let declared = file.mime.as_deref().and_then(normalize_mime);
    let ext = file.extension();
    match collection_type {
        CollectionType::Text => {
            ext.as_deref().is_some_and(|e| TEXT_EXTENSIONS.contains(&e))
                || declared.as_deref().is_some_and(|m| TEXT_MIME_TYPES.contains(&m))
        }
        CollectionType::Handwritten => match declared {
            Some(mime) => mime.starts_with("image/"),
            None => ext.as_deref().is_some_and(|e| IMAGE_EXTENSIONS.contains(&e)),
        },
    }
}

/// Split `files` preserving the caller's order in both halves.
pub fn partition(collection_type: CollectionType, files: Vec<StagedFile>) -> Selection {
    let (accepted, excluded) = files
        .into_iter()
        .partition(|f| accepts(collection_type, f));
    Selection { accepted, excluded }
}

/// MIME type to send for `file`: the declared one when it is well formed,
/// else one derived from the extension.
pub fn mime_for(file: &StagedFile) -> String {
    if let Some(mime) = file.mime.as_deref().and_then(normalize_mime) {
        return mime;
    }
    let mime = match file.extension().as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => TEXT_MIME_TYPES[2],
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => OCTET_STREAM,
    };
    mime.to_string()
}

/// Lowercase `type/subtype`, dropping parameters. `None` if malformed.
fn normalize_mime(raw: &str) -> Option<String> {
    let essence = raw.split(';').next()?.trim().to_lowercase();
    let (ty, sub) = essence.split_once('/')?;
    let valid = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
    };
    if valid(ty) && valid(sub) {
        Some(essence)
    } else {
        None
    }
}
