//! HTTP boundary to the library service.
//!
//! Each collaborator the sync core needs is a small trait so the store, the
//! polling coordinator and the search coordinator can be driven by fakes in
//! tests. [`HttpLibraryClient`] implements all of them over reqwest.

use crate::config::LibraryServiceSettings;
use crate::error::LibraryError;
use crate::models::{
    Document, PaginatedDocumentsResponse, SearchRequest, SearchResponse, StatusUpdate,
    UploadFile, UploadReceipt,
};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use secrecy::ExposeSecret;
use service_core::observability::{TracedClientExt, TracedRequest};

pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const UPLOAD_FIELD_NAME: &str = "pdf_file";

/// Resolves the current processing status for a batch of document ids.
///
/// The response may omit ids the server does not know; callers treat a
/// missing id as "no update this cycle". Failure is all-or-nothing for the
/// batch and is never retried here.
#[async_trait]
pub trait StatusQueryClient: Send + Sync {
    async fn query_statuses(&self, ids: &[String]) -> Result<Vec<StatusUpdate>, LibraryError>;
}

/// Fetches one page of the library.
#[async_trait]
pub trait LibraryPageSource: Send + Sync {
    async fn fetch_library_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<PaginatedDocumentsResponse, LibraryError>;
}

#[async_trait]
pub trait DocumentUploader: Send + Sync {
    async fn upload_document(&self, file: &UploadFile) -> Result<UploadReceipt, LibraryError>;
}

#[async_trait]
pub trait LibrarySearchSource: Send + Sync {
    async fn search_documents(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<Document>, LibraryError>;
}

/// reqwest-backed client for the library service REST API.
#[derive(Clone)]
pub struct HttpLibraryClient {
    client: Client,
    settings: LibraryServiceSettings,
}

impl HttpLibraryClient {
    pub fn new(settings: LibraryServiceSettings) -> Result<Self, LibraryError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| LibraryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    pub fn base_url(&self) -> &str {
        self.settings.url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    fn with_csrf(&self, request: TracedRequest) -> TracedRequest {
        match &self.settings.csrf_token {
            Some(token) => request.header(CSRF_HEADER, token.expose_secret()),
            None => request,
        }
    }

    async fn send(
        &self,
        request: TracedRequest,
        url: &str,
    ) -> Result<reqwest::Response, LibraryError> {
        let response = self.with_csrf(request).send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Library service request failed");
            LibraryError::from(e)
        })?;

        if !response.status().is_success() {
            let err = LibraryError::from_response(response).await;
            tracing::warn!(url = %url, error = %err, "Library service returned an error");
            return Err(err);
        }

        Ok(response)
    }
}

#[async_trait]
impl StatusQueryClient for HttpLibraryClient {
    async fn query_statuses(&self, ids: &[String]) -> Result<Vec<StatusUpdate>, LibraryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url("/api/documents/statuses");
        let joined = ids.join(",");
        let request = self.client.traced_get(&url).query(&[("ids", joined.as_str())]);

        let response = self.send(request, &url).await?;
        let statuses: Vec<StatusUpdate> = response.json().await?;

        tracing::debug!(
            requested = ids.len(),
            received = statuses.len(),
            "Fetched document statuses"
        );
        Ok(statuses)
    }
}

#[async_trait]
impl LibraryPageSource for HttpLibraryClient {
    async fn fetch_library_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<PaginatedDocumentsResponse, LibraryError> {
        let url = self.url("/api/library/documents");
        let request = self
            .client
            .traced_get(&url)
            .query(&[("page", page), ("limit", page_size)]);

        let response = self.send(request, &url).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DocumentUploader for HttpLibraryClient {
    async fn upload_document(&self, file: &UploadFile) -> Result<UploadReceipt, LibraryError> {
        let url = self.url("/api/documents/upload/");
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| LibraryError::Config(format!("Invalid content type: {}", e)))?;
        let form = multipart::Form::new().part(UPLOAD_FIELD_NAME, part);

        tracing::info!(file_name = %file.file_name, size = file.bytes.len(), "Uploading document");

        let response = self.send(self.client.traced_post(&url).multipart(form), &url).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl LibrarySearchSource for HttpLibraryClient {
    async fn search_documents(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<Document>, LibraryError> {
        let url = self.url("/api/library/search");
        let response = self
            .send(self.client.traced_get(&url).query(request), &url)
            .await?;
        let body: SearchResponse = response.json().await?;
        Ok(body.documents)
    }
}
