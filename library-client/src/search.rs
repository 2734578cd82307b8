//! Debounced keyword search over the library.
//!
//! Results live in their own transient list and never touch the
//! [`LibraryStateStore`](crate::store::LibraryStateStore).

use crate::config::SearchSettings;
use crate::models::{Document, SearchRequest, SortOrder};
use crate::services::LibrarySearchSource;
use crate::utils::lock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub term: String,
    pub results: Vec<Document>,
    pub is_loading: bool,
    pub error: Option<String>,
}

struct Shared {
    source: Arc<dyn LibrarySearchSource>,
    debounce: Duration,
    sort_by: Mutex<Option<SortOrder>>,
    state: watch::Sender<SearchState>,
    /// Token of the search currently debouncing or in flight. Held while a
    /// result is applied so replacing it and applying it cannot interleave.
    active: Mutex<Option<CancellationToken>>,
}

pub struct SearchCoordinator {
    shared: Arc<Shared>,
}

impl SearchCoordinator {
    pub fn new(source: Arc<dyn LibrarySearchSource>, settings: &SearchSettings) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            shared: Arc::new(Shared {
                source,
                debounce: settings.debounce(),
                sort_by: Mutex::new(None),
                state,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> SearchState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.shared.state.subscribe()
    }

    /// Replace the search term. A pending or in-flight search is dropped.
    ///
    /// A blank term clears results immediately; anything else is searched
    /// once the debounce elapses without another change.
    pub fn set_term(&self, term: impl Into<String>) {
        let term = term.into();
        let mut active = lock(&self.shared.active);
        if let Some(previous) = active.take() {
            previous.cancel();
        }

        let keyword = term.trim().to_string();
        if keyword.is_empty() {
            self.shared.state.send_replace(SearchState {
                term,
                ..Default::default()
            });
            return;
        }

        self.shared.state.send_modify(|state| {
            state.term = term;
            state.is_loading = true;
            state.error = None;
        });

        let token = CancellationToken::new();
        *active = Some(token.clone());
        let request = SearchRequest {
            keyword,
            sort_by: *lock(&self.shared.sort_by),
        };
        tokio::spawn(run_search(self.shared.clone(), request, token));
    }

    /// Change the result ordering and re-run the current term.
    pub fn set_sort_by(&self, sort_by: Option<SortOrder>) {
        *lock(&self.shared.sort_by) = sort_by;
        let term = self.shared.state.borrow().term.clone();
        self.set_term(term);
    }

    pub fn clear(&self) {
        self.set_term(String::new());
    }
}

impl Drop for SearchCoordinator {
    fn drop(&mut self) {
        if let Some(active) = lock(&self.shared.active).take() {
            active.cancel();
        }
    }
}

async fn run_search(shared: Arc<Shared>, request: SearchRequest, token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => return,
        _ = tokio::time::sleep(shared.debounce) => {}
    }

    tracing::debug!(keyword = %request.keyword, "Searching library");
    let result = tokio::select! {
        _ = token.cancelled() => {
            tracing::debug!(keyword = %request.keyword, "Search superseded");
            return;
        }
        result = shared.source.search_documents(&request) => result,
    };

    let mut active = lock(&shared.active);
    if token.is_cancelled() {
        return;
    }
    active.take();

    shared.state.send_modify(|state| {
        state.is_loading = false;
        match result {
            Ok(documents) => {
                tracing::debug!(
                    keyword = %request.keyword,
                    results = documents.len(),
                    "Search finished"
                );
                state.results = documents;
                state.error = None;
            }
            Err(e) => {
                tracing::warn!(keyword = %request.keyword, error = %e, "Search failed");
                state.results.clear();
                state.error = Some(e.to_string());
            }
        }
    });
}
