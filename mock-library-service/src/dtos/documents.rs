use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Processing,
    Ready,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDto {
    pub id: String,
    pub title: String,
    pub file_name: String,
    pub updated_at: DateTime<Utc>,
    pub status: DocumentStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentDto>,
    pub total_count: u64,
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// `ids` is a comma-separated list.
#[derive(Debug, Deserialize)]
pub struct StatusQueryParams {
    pub ids: Option<String>,
}

impl StatusQueryParams {
    pub fn id_list(&self) -> Vec<String> {
        self.ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusDto {
    pub id: String,
    pub status: DocumentStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub document_id: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum SortBy {
    #[serde(rename = "relevance")]
    Relevance,
    #[serde(rename = "updatedAt_desc")]
    UpdatedAtDesc,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub keyword: Option<String>,
    pub sort_by: Option<SortBy>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub documents: Vec<DocumentDto>,
}
