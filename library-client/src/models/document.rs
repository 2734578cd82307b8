use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing state reported by the library service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcessingStatus {
    #[serde(alias = "Processing")]
    Processing,
    #[serde(alias = "Ready")]
    Ready,
    #[serde(alias = "Error")]
    Error,
}

impl ProcessingStatus {
    pub fn is_pending(self) -> bool {
        self == ProcessingStatus::Processing
    }
}

/// A document in the user's library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub file_name: String,
    pub updated_at: DateTime<Utc>,
    pub status: ProcessingStatus,
    /// 0..=100; only meaningful while `status` is `Processing`.
    #[serde(default)]
    pub progress: u8,
    #[serde(default, alias = "error_message", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl Document {
    /// Overwrite the status-related fields from a polled update. Every other
    /// field is left as it was.
    pub fn apply_status(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        self.progress = normalized_progress(update.status, update.progress, self.progress);
        self.error_message = update.error_message.clone();
    }

    /// Apply a partial update. Status changes go through the same progress
    /// normalisation as polled updates.
    pub fn apply_patch(&mut self, patch: &DocumentPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(file_name) = &patch.file_name {
            self.file_name = file_name.clone();
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = updated_at;
        }
        if let Some(thumbnail_url) = &patch.thumbnail_url {
            self.thumbnail_url = thumbnail_url.clone();
        }
        if let Some(error_message) = &patch.error_message {
            self.error_message = error_message.clone();
        }

        let status = patch.status.unwrap_or(self.status);
        let progress = patch.progress.unwrap_or(self.progress);
        self.progress = normalized_progress(status, progress, self.progress);
        self.status = status;
    }
}

/// READY pins progress to 100; ERROR keeps the reported value, falling back
/// to the last known one when the server reports 0.
fn normalized_progress(status: ProcessingStatus, reported: u8, previous: u8) -> u8 {
    match status {
        ProcessingStatus::Processing => reported.min(100),
        ProcessingStatus::Ready => 100,
        ProcessingStatus::Error if reported == 0 => previous.min(100),
        ProcessingStatus::Error => reported.min(100),
    }
}

/// One entry of a batch status query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdate {
    pub id: String,
    pub status: ProcessingStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default, alias = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StatusUpdate {
    pub fn new(id: impl Into<String>, status: ProcessingStatus, progress: u8) -> Self {
        Self {
            id: id.into(),
            status,
            progress,
            error_message: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Field-level partial update for [`Document`]. `None` leaves the field
/// untouched; the nested options clear a field with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub status: Option<ProcessingStatus>,
    pub progress: Option<u8>,
    pub error_message: Option<Option<String>>,
    pub thumbnail_url: Option<Option<String>>,
}

impl DocumentPatch {
    pub fn status(status: ProcessingStatus, progress: u8) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress),
            ..Default::default()
        }
    }
}

/// Paginated list response from `GET /api/library/documents`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedDocumentsResponse {
    pub documents: Vec<Document>,
    pub total_count: u64,
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// Response of `POST /api/documents/upload/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub document_id: Option<String>,
}

fn default_success() -> bool {
    true
}

/// A file to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: "application/pdf".to_string(),
            bytes,
        }
    }

    /// Read a file from disk; the content type is guessed from the extension.
    pub async fn from_path(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.pdf")
            .to_string();
        let content_type = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => "application/pdf",
            _ => "application/octet-stream",
        };

        Ok(Self {
            file_name,
            content_type: content_type.to_string(),
            bytes,
        })
    }
}

/// Keyword search request for `GET /api/library/search`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortOrder {
    #[serde(rename = "relevance")]
    Relevance,
    #[serde(rename = "updatedAt_desc")]
    UpdatedAtDesc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// How the presentation layer lays out the document list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Grid,
}
