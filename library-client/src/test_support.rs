//! In-memory collaborators for unit tests. Each test owns its own instances.

use crate::error::LibraryError;
use crate::models::{
    Document, PaginatedDocumentsResponse, ProcessingStatus, SearchRequest, StatusUpdate,
    UploadFile, UploadReceipt,
};
use crate::services::{DocumentUploader, LibraryPageSource, LibrarySearchSource, StatusQueryClient};
use crate::utils::lock;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

pub fn doc(id: &str, status: ProcessingStatus, progress: u8) -> Document {
    Document {
        id: id.to_string(),
        title: format!("Title {id}"),
        file_name: format!("{id}.pdf"),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        status,
        progress,
        error_message: None,
        thumbnail_url: Some(format!("https://cdn.example/{id}.png")),
    }
}

pub fn page_response(
    documents: Vec<Document>,
    current_page: u32,
    total_pages: u32,
) -> PaginatedDocumentsResponse {
    PaginatedDocumentsResponse {
        total_count: u64::from(total_pages) * 10,
        documents,
        current_page,
        page_size: 10,
        total_pages,
    }
}

/// Tracks concurrent requests; `max()` is the high-water mark.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Status client that replays queued responses, optionally after a delay or
/// held behind a gate. An empty queue answers with an empty batch.
pub struct ScriptedStatusClient {
    responses: Mutex<VecDeque<Result<Vec<StatusUpdate>, LibraryError>>>,
    calls: Mutex<Vec<Vec<String>>>,
    delay: Mutex<Duration>,
    echo_progress: Mutex<Option<u8>>,
    gated: AtomicBool,
    gate: Semaphore,
    pub in_flight: InFlight,
}

impl ScriptedStatusClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
            echo_progress: Mutex::new(None),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            in_flight: InFlight::default(),
        }
    }

    pub fn push_ok(&self, updates: Vec<StatusUpdate>) {
        lock(&self.responses).push_back(Ok(updates));
    }

    pub fn push_err(&self, err: LibraryError) {
        lock(&self.responses).push_back(Err(err));
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    /// With an empty queue, answer every requested id as `Processing` at
    /// `progress`.
    pub fn echo(&self, progress: u8) {
        *lock(&self.echo_progress) = Some(progress);
    }

    /// Block every request until `release` hands out a permit.
    pub fn hold_requests(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, requests: usize) {
        self.gate.add_permits(requests);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl StatusQueryClient for ScriptedStatusClient {
    async fn query_statuses(&self, ids: &[String]) -> Result<Vec<StatusUpdate>, LibraryError> {
        lock(&self.calls).push(ids.to_vec());
        self.in_flight.enter();

        if self.gated.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.exit();
        let scripted = lock(&self.responses).pop_front();
        scripted.unwrap_or_else(|| {
            let echoed = match *lock(&self.echo_progress) {
                Some(progress) => ids
                    .iter()
                    .map(|id| StatusUpdate::new(id.clone(), ProcessingStatus::Processing, progress))
                    .collect(),
                None => Vec::new(),
            };
            Ok(echoed)
        })
    }
}

/// Page source backed by a map of canned responses.
#[derive(Default)]
pub struct FakePageSource {
    pages: Mutex<HashMap<u32, PaginatedDocumentsResponse>>,
    failures: Mutex<VecDeque<LibraryError>>,
    delays: Mutex<HashMap<u32, Duration>>,
    calls: Mutex<Vec<(u32, u32)>>,
}

impl FakePageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, page: u32, response: PaginatedDocumentsResponse) -> Self {
        self.set_page(page, response);
        self
    }

    pub fn set_page(&self, page: u32, response: PaginatedDocumentsResponse) {
        lock(&self.pages).insert(page, response);
    }

    pub fn fail_next(&self, err: LibraryError) {
        lock(&self.failures).push_back(err);
    }

    pub fn delay_page(&self, page: u32, delay: Duration) {
        lock(&self.delays).insert(page, delay);
    }

    pub fn calls(&self) -> Vec<(u32, u32)> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl LibraryPageSource for FakePageSource {
    async fn fetch_library_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<PaginatedDocumentsResponse, LibraryError> {
        lock(&self.calls).push((page, page_size));

        let delay = lock(&self.delays).get(&page).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = lock(&self.failures).pop_front() {
            return Err(err);
        }

        lock(&self.pages)
            .get(&page)
            .cloned()
            .ok_or_else(|| LibraryError::http(reqwest::StatusCode::NOT_FOUND, "no such page"))
    }
}

/// Search source answering every keyword with the documents whose title
/// contains it.
#[derive(Default)]
pub struct FakeSearchSource {
    documents: Vec<Document>,
    failures: Mutex<VecDeque<LibraryError>>,
    calls: Mutex<Vec<SearchRequest>>,
    delay: Mutex<Duration>,
}

impl FakeSearchSource {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            ..Default::default()
        }
    }

    pub fn fail_next(&self, err: LibraryError) {
        lock(&self.failures).push_back(err);
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    pub fn calls(&self) -> Vec<SearchRequest> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl LibrarySearchSource for FakeSearchSource {
    async fn search_documents(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<Document>, LibraryError> {
        lock(&self.calls).push(request.clone());
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = lock(&self.failures).pop_front() {
            return Err(err);
        }
        let keyword = request.keyword.to_lowercase();
        Ok(self
            .documents
            .iter()
            .filter(|doc| doc.title.to_lowercase().contains(&keyword))
            .cloned()
            .collect())
    }
}

/// Uploader that answers with a queued receipt or error.
#[derive(Default)]
pub struct FakeUploader {
    results: Mutex<VecDeque<Result<UploadReceipt, LibraryError>>>,
    uploads: Mutex<Vec<UploadFile>>,
}

impl FakeUploader {
    pub fn push(&self, result: Result<UploadReceipt, LibraryError>) {
        lock(&self.results).push_back(result);
    }

    pub fn uploads(&self) -> Vec<UploadFile> {
        lock(&self.uploads).clone()
    }
}

#[async_trait]
impl DocumentUploader for FakeUploader {
    async fn upload_document(&self, file: &UploadFile) -> Result<UploadReceipt, LibraryError> {
        lock(&self.uploads).push(file.clone());
        lock(&self.results).pop_front().unwrap_or_else(|| {
            Ok(UploadReceipt {
                success: true,
                message: String::new(),
                document_id: None,
            })
        })
    }
}
