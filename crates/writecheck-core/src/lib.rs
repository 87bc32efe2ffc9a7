use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod collection;
pub mod config_file;
pub mod duplicates;
pub mod error;
pub mod filter;
pub mod service;
pub mod transfer;
pub mod workflow;

// Re-export for convenience
pub use collection::CollectionStore;
pub use duplicates::DuplicateReportEngine;
pub use error::{
    DeleteError, DuplicateQueryError, FetchError, ServiceError, UploadError, WorkflowError,
};
pub use filter::ExclusionPolicy;
pub use service::{EvaluationService, HttpEvaluationService};
pub use transfer::{TransferCoordinator, UploadResult};
pub use workflow::{CheckOutcome, Phase, SubmitOutcome, WorkflowController, WorkflowState};

/// Default address of the evaluation service (Flask's development port).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Declared mode of a collection. Decides which local files may be staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    /// Typed documents: PDF, DOC, DOCX.
    #[default]
    Text,
    /// Scanned handwriting: any image.
    Handwritten,
}

impl CollectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionType::Text => "text",
            CollectionType::Handwritten => "handwritten",
        }
    }

    /// Status line shown right after the type is chosen.
    pub fn hint(&self) -> String {
        match self {
            CollectionType::Text => format!(
                "Accepted extensions: {}",
                filter::TEXT_EXTENSIONS
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            CollectionType::Handwritten => format!(
                "Accepted extensions: any image ({})",
                filter::IMAGE_EXTENSIONS
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "typed" => Ok(CollectionType::Text),
            "handwritten" | "handwriting" | "image" => Ok(CollectionType::Handwritten),
            other => Err(format!(
                "unknown collection type '{other}' (expected 'text' or 'handwritten')"
            )),
        }
    }
}

/// Where the bytes of a staged file come from.
#[derive(Clone, PartialEq, Eq)]
pub enum FileContent {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl fmt::Debug for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileContent::Path(p) => f.debug_tuple("Path").field(p).finish(),
            FileContent::Bytes(b) => write!(f, "Bytes(<{} bytes>)", b.len()),
        }
    }
}

/// A locally selected file that has not been uploaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// File name as it will be sent to the service.
    pub name: String,
    /// MIME type declared by whoever picked the file, if any.
    pub mime: Option<String>,
    pub content: FileContent,
}

impl StagedFile {
    /// Stage a file on disk. The contents are read only when the batch is sent.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            mime: None,
            content: FileContent::Path(path.to_path_buf()),
        }
    }

    pub fn in_memory(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: None,
            content: FileContent::Bytes(data),
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Lowercased extension of the file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// One file the service reports as stored for the active collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
}

impl From<String> for RemoteFile {
    fn from(name: String) -> Self {
        Self { name }
    }
}

/// Two stored files the service considers similar, with a score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub file_a: String,
    pub file_b: String,
    pub score: f64,
}

impl DuplicatePair {
    pub fn new(file_a: impl Into<String>, file_b: impl Into<String>, score: f64) -> Self {
        Self {
            file_a: file_a.into(),
            file_b: file_b.into(),
            score,
        }
    }
}

/// Effective configuration for a session.
#[derive(Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    /// Per-request timeout. `None` leaves requests unbounded.
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: u64,
    pub default_type: CollectionType,
    pub exclusion_policy: ExclusionPolicy,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("default_type", &self.default_type)
            .field("exclusion_policy", &self.exclusion_policy)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
            connect_timeout_secs: 10,
            default_type: CollectionType::Text,
            exclusion_policy: ExclusionPolicy::Silent,
        }
    }
}

impl Config {
    /// Apply a loaded config file over the defaults.
    pub fn from_file(file: &config_file::ConfigFile) -> Self {
        let defaults = Self::default();
        let service = file.service.as_ref();
        let selection = file.selection.as_ref();
        Self {
            base_url: service
                .and_then(|s| s.base_url.clone())
                .unwrap_or(defaults.base_url),
            timeout_secs: service.and_then(|s| s.timeout_secs).filter(|&t| t > 0),
            connect_timeout_secs: service
                .and_then(|s| s.connect_timeout_secs)
                .unwrap_or(defaults.connect_timeout_secs),
            default_type: selection
                .and_then(|s| s.default_type)
                .unwrap_or(defaults.default_type),
            exclusion_policy: selection
                .and_then(|s| s.exclusion_policy)
                .unwrap_or(defaults.exclusion_policy),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::{ConfigFile, SelectionConfig, ServiceConfig};

    #[test]
    fn collection_type_parses_aliases() {
        assert_eq!("Text".parse::<CollectionType>(), Ok(CollectionType::Text));
        assert_eq!(
            " handwriting ".parse::<CollectionType>(),
            Ok(CollectionType::Handwritten)
        );
        assert!("audio".parse::<CollectionType>().is_err());
    }

    #[test]
    fn text_hint_lists_document_extensions() {
        assert_eq!(
            CollectionType::Text.hint(),
            "Accepted extensions: .pdf, .doc, .docx"
        );
        assert!(CollectionType::Handwritten.hint().contains(".png"));
    }

    #[test]
    fn staged_file_from_path_uses_file_name() {
        let staged = StagedFile::from_path("/tmp/essays/Report.PDF");
        assert_eq!(staged.name, "Report.PDF");
        assert_eq!(staged.extension().as_deref(), Some("pdf"));
        assert_eq!(
            staged.content,
            FileContent::Path(PathBuf::from("/tmp/essays/Report.PDF"))
        );
    }

    #[test]
    fn bytes_debug_hides_contents() {
        let staged = StagedFile::in_memory("a.pdf", vec![1, 2, 3]);
        assert_eq!(format!("{:?}", staged.content), "Bytes(<3 bytes>)");
    }

    #[test]
    fn config_from_empty_file_is_default() {
        assert_eq!(Config::from_file(&ConfigFile::default()), Config::default());
    }

    #[test]
    fn config_from_file_overrides_defaults() {
        let file = ConfigFile {
            service: Some(ServiceConfig {
                base_url: Some("http://checker:8080".into()),
                timeout_secs: Some(0),
                connect_timeout_secs: Some(3),
            }),
            selection: Some(SelectionConfig {
                default_type: Some(CollectionType::Handwritten),
                exclusion_policy: Some(ExclusionPolicy::Report),
            }),
            ..Default::default()
        };
        let config = Config::from_file(&file);
        assert_eq!(config.base_url, "http://checker:8080");
        // Zero means "no timeout".
        assert_eq!(config.timeout(), None);
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.default_type, CollectionType::Handwritten);
        assert_eq!(config.exclusion_policy, ExclusionPolicy::Report);
    }
}
