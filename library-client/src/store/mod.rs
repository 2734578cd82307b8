//! Authoritative in-memory copy of the currently loaded library page.
//!
//! Every mutation happens under one synchronous lock and finishes by
//! recomputing the pending set. Observers of [`LibraryStateStore::subscribe_pending`]
//! are only woken when the set of pending ids actually changes.

use crate::config::LibrarySettings;
use crate::error::LibraryError;
use crate::models::{Document, DocumentPatch, Page, PendingSet, StatusUpdate};
use crate::services::metrics::{record_page_fetch, record_status_updates_applied};
use crate::services::LibraryPageSource;
use crate::utils::lock;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Default)]
struct LibraryState {
    page: Option<Page>,
    error: Option<String>,
    next_ticket: u64,
    /// Newest ticket whose result (page or error) has been applied.
    settled: u64,
    in_flight: BTreeSet<u64>,
}

impl LibraryState {
    fn is_loading(&self) -> bool {
        self.in_flight.last().is_some_and(|ticket| *ticket > self.settled)
    }

    /// A result may be applied unless a newer fetch already settled or is
    /// still running.
    fn accepts(&self, ticket: u64) -> bool {
        ticket > self.settled && self.in_flight.last().map_or(true, |newest| *newest <= ticket)
    }
}

/// Registration of one running fetch. Dropping it before completion
/// withdraws the ticket so older fetches still running can install their
/// result.
struct FetchTicket<'a> {
    state: &'a Mutex<LibraryState>,
    ticket: u64,
    armed: bool,
}

impl<'a> FetchTicket<'a> {
    fn issue(state: &'a Mutex<LibraryState>) -> Self {
        let mut guard = lock(state);
        guard.next_ticket += 1;
        let ticket = guard.next_ticket;
        guard.in_flight.insert(ticket);
        Self {
            state,
            ticket,
            armed: true,
        }
    }

    /// Hand the ticket back under the caller's lock.
    fn complete(mut self, state: &mut LibraryState) -> u64 {
        self.armed = false;
        state.in_flight.remove(&self.ticket);
        self.ticket
    }
}

impl Drop for FetchTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(ticket = self.ticket, "Page fetch abandoned");
            lock(self.state).in_flight.remove(&self.ticket);
        }
    }
}

/// Point-in-time copy of the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LibrarySnapshot {
    pub page: Option<Page>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl LibrarySnapshot {
    pub fn documents(&self) -> &[Document] {
        self.page.as_ref().map(|page| page.items.as_slice()).unwrap_or_default()
    }
}

pub struct LibraryStateStore {
    source: Arc<dyn LibraryPageSource>,
    page_size: u32,
    initial_page: u32,
    state: Mutex<LibraryState>,
    pending: watch::Sender<PendingSet>,
}

impl LibraryStateStore {
    pub fn new(source: Arc<dyn LibraryPageSource>, settings: &LibrarySettings) -> Self {
        let (pending, _) = watch::channel(PendingSet::default());
        Self {
            source,
            page_size: settings.page_size.max(1),
            initial_page: settings.initial_page.max(1),
            state: Mutex::new(LibraryState::default()),
            pending,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch page `page` and install it.
    ///
    /// On failure the previously loaded page stays and the error message is
    /// recorded next to it. When fetches overlap only the most recently
    /// issued one is installed; earlier results are still returned to their
    /// caller. A fetch whose future is dropped early no longer counts as
    /// issued.
    pub async fn fetch_page(&self, page: u32) -> Result<Page, LibraryError> {
        let pending_fetch = FetchTicket::issue(&self.state);

        tracing::debug!(page, page_size = self.page_size, "Fetching library page");
        let result = self.source.fetch_library_page(page, self.page_size).await;

        let mut state = lock(&self.state);
        let ticket = pending_fetch.complete(&mut state);
        if !state.accepts(ticket) {
            tracing::debug!(page, "Dropping superseded page fetch");
            record_page_fetch("superseded");
            return result.map(|response| Page::from_response(response, self.page_size));
        }
        state.settled = ticket;

        match result {
            Ok(response) => {
                let loaded = Page::from_response(response, self.page_size);
                tracing::info!(
                    page = loaded.current_page,
                    total_pages = loaded.total_pages,
                    documents = loaded.items.len(),
                    "Library page loaded"
                );
                state.page = Some(loaded.clone());
                state.error = None;
                self.publish_pending(&state);
                record_page_fetch("success");
                Ok(loaded)
            }
            Err(e) => {
                tracing::warn!(page, error = %e, "Failed to fetch library page");
                state.error = Some(e.to_string());
                record_page_fetch("failure");
                Err(e)
            }
        }
    }

    /// Navigate to `page`. Returns `None` without touching the network when
    /// nothing is loaded yet, the page is out of range, or it is already the
    /// current page.
    pub async fn change_page(&self, page: u32) -> Option<Result<Page, LibraryError>> {
        let allowed = {
            let state = lock(&self.state);
            state.page.as_ref().is_some_and(|current| {
                page >= 1 && page <= current.total_pages && page != current.current_page
            })
        };
        if !allowed {
            tracing::debug!(page, "Ignoring page change");
            return None;
        }
        Some(self.fetch_page(page).await)
    }

    /// Re-fetch the current page, or the initial page when nothing has
    /// loaded yet.
    pub async fn refresh(&self) -> Result<Page, LibraryError> {
        let page = lock(&self.state)
            .page
            .as_ref()
            .map(|current| current.current_page)
            .unwrap_or(self.initial_page);
        self.fetch_page(page).await
    }

    pub async fn retry(&self) -> Result<Page, LibraryError> {
        self.refresh().await
    }

    /// Overwrite status, progress and error message of every document in the
    /// current page whose id appears in `updates`. Returns how many documents
    /// actually changed.
    pub fn merge_statuses(&self, updates: &[StatusUpdate]) -> usize {
        let mut state = lock(&self.state);
        let Some(page) = state.page.as_mut() else {
            tracing::debug!(received = updates.len(), "No page loaded, dropping status updates");
            return 0;
        };

        let mut changed = 0;
        for update in updates {
            let Some(document) = page.find_mut(&update.id) else {
                tracing::trace!(document_id = %update.id, "Status update for document not on page");
                continue;
            };
            let before = (document.status, document.progress, document.error_message.clone());
            document.apply_status(update);
            if before != (document.status, document.progress, document.error_message.clone()) {
                changed += 1;
            }
        }

        if changed > 0 {
            tracing::debug!(changed, "Merged status updates");
            record_status_updates_applied(changed);
        }
        self.publish_pending(&state);
        changed
    }

    /// Replace the documents of the current page, keeping its pagination.
    pub fn replace_all(&self, documents: Vec<Document>) {
        let mut state = lock(&self.state);
        match state.page.as_mut() {
            Some(page) => {
                let mut documents = documents;
                if documents.len() > page.page_size as usize {
                    tracing::warn!(
                        received = documents.len(),
                        page_size = page.page_size,
                        "Replacement larger than page size, truncating"
                    );
                    documents.truncate(page.page_size as usize);
                }
                page.items = documents;
            }
            None => state.page = Some(Page::standalone(documents, self.page_size)),
        }
        self.publish_pending(&state);
    }

    /// Apply `patch` to the document with `id`. Returns false when it is not
    /// on the current page.
    pub fn patch_one(&self, id: &str, patch: &DocumentPatch) -> bool {
        let mut state = lock(&self.state);
        let found = match state.page.as_mut().and_then(|page| page.find_mut(id)) {
            Some(document) => {
                document.apply_patch(patch);
                true
            }
            None => false,
        };
        if found {
            self.publish_pending(&state);
        }
        found
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.borrow().to_vec()
    }

    pub fn subscribe_pending(&self) -> watch::Receiver<PendingSet> {
        self.pending.subscribe()
    }

    pub fn snapshot(&self) -> LibrarySnapshot {
        let state = lock(&self.state);
        LibrarySnapshot {
            page: state.page.clone(),
            is_loading: state.is_loading(),
            error: state.error.clone(),
        }
    }

    fn publish_pending(&self, state: &LibraryState) {
        let next = state
            .page
            .as_ref()
            .map(Page::pending_set)
            .unwrap_or_default();
        self.pending.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
