//! In-memory library behind the mock endpoints.
//!
//! A [`MockLibrary`] is a cheap cloneable handle; every clone sees the same
//! documents. Tests build one, hand a clone to [`Application::build`], and
//! keep the other to inspect or steer the server.
//!
//! Processing is simulated per status query: each query advances a
//! `PROCESSING` document by one step (20%), and after five steps it settles
//! as `READY`, or `ERROR` when it was marked to fail.
//!
//! [`Application::build`]: crate::startup::Application::build

use crate::dtos::{DocumentDto, DocumentListResponse, DocumentStatus, SortBy, StatusDto};
use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

pub const STEPS_TO_COMPLETE: u8 = 5;
const PROGRESS_PER_STEP: u8 = 20;
const MAX_PAGE_SIZE: u32 = 100;
pub const PROCESSING_FAILED_MESSAGE: &str = "Document processing failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListDocuments,
    Statuses,
    Status,
    Upload,
    Search,
}

#[derive(Debug, Clone)]
struct Entry {
    document: DocumentDto,
    step: u8,
    will_fail: bool,
}

impl Entry {
    fn advance(&mut self) {
        if self.document.status != DocumentStatus::Processing {
            return;
        }
        self.step = (self.step + 1).min(STEPS_TO_COMPLETE);
        self.document.progress = (self.step * PROGRESS_PER_STEP).min(100);

        if self.step >= STEPS_TO_COMPLETE {
            if self.will_fail {
                self.document.status = DocumentStatus::Error;
                self.document.error_message = Some(PROCESSING_FAILED_MESSAGE.to_string());
            } else {
                self.document.status = DocumentStatus::Ready;
            }
            self.document.progress = 100;
            tracing::debug!(
                document_id = %self.document.id,
                status = ?self.document.status,
                "Processing finished"
            );
        }
    }

    fn status(&self) -> StatusDto {
        StatusDto {
            id: self.document.id.clone(),
            status: self.document.status,
            progress: self.document.progress,
            error_message: self.document.error_message.clone(),
        }
    }
}

#[derive(Default)]
struct LibraryData {
    entries: Vec<Entry>,
    failures: HashMap<Endpoint, VecDeque<u16>>,
    requests: HashMap<Endpoint, usize>,
}

#[derive(Clone, Default)]
pub struct MockLibrary {
    inner: Arc<RwLock<LibraryData>>,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` documents with statuses drawn from `seed`. The same seed
    /// always yields the same library.
    pub fn seeded(count: usize, seed: u64) -> Self {
        let library = Self::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let base = seed_epoch();

        for i in 1..=count {
            let status = match rng.gen_range(0..3) {
                0 => DocumentStatus::Ready,
                1 => DocumentStatus::Processing,
                _ => DocumentStatus::Error,
            };
            let step = match status {
                DocumentStatus::Processing => rng.gen_range(0..STEPS_TO_COMPLETE - 1),
                _ => STEPS_TO_COMPLETE,
            };
            let will_fail = rng.gen_bool(0.3);

            let document = DocumentDto {
                id: format!("doc{i}"),
                title: format!("Sample document {i}"),
                file_name: format!("sample_document_{i}.pdf"),
                updated_at: base - chrono::Duration::hours(i as i64),
                status,
                progress: match status {
                    DocumentStatus::Processing => step * PROGRESS_PER_STEP,
                    _ => 100,
                },
                error_message: (status == DocumentStatus::Error)
                    .then(|| PROCESSING_FAILED_MESSAGE.to_string()),
                thumbnail_url: Some(format!("https://via.placeholder.com/150?text=Doc{i}")),
            };
            write(&library.inner).entries.push(Entry {
                document,
                step,
                will_fail,
            });
        }

        tracing::info!(documents = count, seed, "Seeded mock library");
        library
    }

    /// Append a document. A `PROCESSING` document resumes from the step its
    /// progress implies.
    pub fn insert(&self, document: DocumentDto, will_fail: bool) {
        let step = match document.status {
            DocumentStatus::Processing => {
                (document.progress / PROGRESS_PER_STEP).min(STEPS_TO_COMPLETE - 1)
            }
            _ => STEPS_TO_COMPLETE,
        };
        write(&self.inner).entries.push(Entry {
            document,
            step,
            will_fail,
        });
    }

    pub fn len(&self) -> usize {
        read(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn document(&self, id: &str) -> Option<DocumentDto> {
        read(&self.inner)
            .entries
            .iter()
            .find(|entry| entry.document.id == id)
            .map(|entry| entry.document.clone())
    }

    pub fn page(&self, page: u32, limit: u32) -> DocumentListResponse {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let data = read(&self.inner);
        let total = data.entries.len();
        let offset = (page as usize - 1) * limit as usize;

        DocumentListResponse {
            documents: data
                .entries
                .iter()
                .skip(offset)
                .take(limit as usize)
                .map(|entry| entry.document.clone())
                .collect(),
            total_count: total as u64,
            current_page: page,
            page_size: limit,
            total_pages: total.div_ceil(limit as usize) as u32,
        }
    }

    /// Advance and report every known id, in request order. Unknown ids are
    /// left out.
    pub fn advance_statuses(&self, ids: &[String]) -> Vec<StatusDto> {
        let mut data = write(&self.inner);
        ids.iter()
            .filter_map(|id| {
                let entry = data.entries.iter_mut().find(|entry| &entry.document.id == id)?;
                entry.advance();
                Some(entry.status())
            })
            .collect()
    }

    pub fn advance_status(&self, id: &str) -> Option<StatusDto> {
        self.advance_statuses(&[id.to_string()]).pop()
    }

    /// Register an uploaded file as a new `PROCESSING` document at the front
    /// of the library.
    pub fn upload(&self, file_name: &str) -> DocumentDto {
        let title = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name)
            .to_string();
        let document = DocumentDto {
            id: format!("doc-{}", Uuid::new_v4().simple()),
            title,
            file_name: file_name.to_string(),
            updated_at: Utc::now(),
            status: DocumentStatus::Processing,
            progress: 0,
            error_message: None,
            thumbnail_url: None,
        };
        write(&self.inner).entries.insert(
            0,
            Entry {
                document: document.clone(),
                step: 0,
                will_fail: false,
            },
        );
        document
    }

    /// Case-insensitive match on title or file name. Relevance puts title
    /// matches first.
    pub fn search(&self, keyword: &str, sort_by: Option<SortBy>) -> Vec<DocumentDto> {
        let keyword = keyword.to_lowercase();
        let data = read(&self.inner);
        let mut matches: Vec<(bool, DocumentDto)> = data
            .entries
            .iter()
            .filter_map(|entry| {
                let in_title = entry.document.title.to_lowercase().contains(&keyword);
                let in_file = entry.document.file_name.to_lowercase().contains(&keyword);
                (in_title || in_file).then(|| (in_title, entry.document.clone()))
            })
            .collect();

        match sort_by {
            Some(SortBy::UpdatedAtDesc) => {
                matches.sort_by(|a, b| b.1.updated_at.cmp(&a.1.updated_at))
            }
            Some(SortBy::Relevance) | None => matches.sort_by_key(|(in_title, _)| !*in_title),
        }
        matches.into_iter().map(|(_, document)| document).collect()
    }

    /// Make the next request to `endpoint` fail with `status`.
    pub fn fail_next(&self, endpoint: Endpoint, status: u16) {
        write(&self.inner)
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(status);
    }

    pub(crate) fn record_request(&self, endpoint: Endpoint) -> Option<u16> {
        let mut data = write(&self.inner);
        *data.requests.entry(endpoint).or_default() += 1;
        data.failures.get_mut(&endpoint).and_then(VecDeque::pop_front)
    }

    pub fn request_count(&self, endpoint: Endpoint) -> usize {
        read(&self.inner)
            .requests
            .get(&endpoint)
            .copied()
            .unwrap_or_default()
    }
}

fn read(lock: &RwLock<LibraryData>) -> RwLockReadGuard<'_, LibraryData> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(lock: &RwLock<LibraryData>) -> RwLockWriteGuard<'_, LibraryData> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn seed_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processing(id: &str, progress: u8) -> DocumentDto {
        DocumentDto {
            id: id.to_string(),
            title: format!("Report {id}"),
            file_name: format!("{id}.pdf"),
            updated_at: seed_epoch(),
            status: DocumentStatus::Processing,
            progress,
            error_message: None,
            thumbnail_url: None,
        }
    }

    #[test]
    fn seeding_is_deterministic() {
        let a = MockLibrary::seeded(25, 7);
        let b = MockLibrary::seeded(25, 7);

        assert_eq!(a.len(), 25);
        assert_eq!(a.page(1, 25).documents, b.page(1, 25).documents);
        for document in a.page(1, 25).documents {
            match document.status {
                DocumentStatus::Processing => {
                    assert!(document.progress < 100);
                    assert_eq!(document.progress % PROGRESS_PER_STEP, 0);
                }
                _ => assert_eq!(document.progress, 100),
            }
        }
    }

    #[test]
    fn pages_are_sliced_and_counted() {
        let library = MockLibrary::seeded(25, 1);

        let last = library.page(3, 10);
        assert_eq!(last.documents.len(), 5);
        assert_eq!(last.documents[0].id, "doc21");
        assert_eq!(last.total_pages, 3);
        assert_eq!(last.total_count, 25);

        let empty = MockLibrary::new().page(1, 10);
        assert!(empty.documents.is_empty());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn processing_completes_after_five_queries() {
        let library = MockLibrary::new();
        library.insert(processing("ok", 0), false);
        library.insert(processing("bad", 0), true);
        let ids = vec!["ok".to_string(), "bad".to_string(), "ghost".to_string()];

        for step in 1..STEPS_TO_COMPLETE {
            let statuses = library.advance_statuses(&ids);
            assert_eq!(statuses.len(), 2);
            assert_eq!(statuses[0].progress, step * 20);
            assert_eq!(statuses[0].status, DocumentStatus::Processing);
        }

        let last = library.advance_statuses(&ids);
        assert_eq!(last[0].status, DocumentStatus::Ready);
        assert_eq!(last[0].progress, 100);
        assert_eq!(last[1].status, DocumentStatus::Error);
        assert_eq!(last[1].error_message.as_deref(), Some(PROCESSING_FAILED_MESSAGE));

        // Settled documents stay put.
        assert_eq!(library.advance_status("ok").unwrap(), last[0]);
    }

    #[test]
    fn insert_resumes_from_reported_progress() {
        let library = MockLibrary::new();
        library.insert(processing("doc1", 60), false);

        assert_eq!(library.advance_status("doc1").unwrap().progress, 80);
        assert_eq!(library.advance_status("doc1").unwrap().status, DocumentStatus::Ready);
    }

    #[test]
    fn upload_prepends_a_processing_document() {
        let library = MockLibrary::seeded(3, 1);

        let uploaded = library.upload("quarterly.pdf");

        assert_eq!(uploaded.title, "quarterly");
        assert_eq!(uploaded.status, DocumentStatus::Processing);
        assert_eq!(library.page(1, 10).documents[0].id, uploaded.id);
        assert_eq!(library.len(), 4);
    }

    #[test]
    fn search_ranks_title_matches_first() {
        let library = MockLibrary::new();
        let mut by_file = processing("a", 0);
        by_file.title = "Unrelated".to_string();
        by_file.file_name = "budget.pdf".to_string();
        let mut by_title = processing("b", 0);
        by_title.title = "Budget 2024".to_string();
        library.insert(by_file, false);
        library.insert(by_title, false);

        let found = library.search("BUDGET", None);
        assert_eq!(
            found.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["b", "a"]
        );
        assert!(library.search("nothing", None).is_empty());
    }

    #[test]
    fn injected_failures_are_consumed_in_order() {
        let library = MockLibrary::new();
        library.fail_next(Endpoint::Statuses, 503);

        assert_eq!(library.record_request(Endpoint::Statuses), Some(503));
        assert_eq!(library.record_request(Endpoint::Statuses), None);
        assert_eq!(library.request_count(Endpoint::Statuses), 2);
        assert_eq!(library.request_count(Endpoint::Upload), 0);
    }
}
