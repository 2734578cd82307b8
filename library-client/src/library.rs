//! The document library view model.
//!
//! [`DocumentLibrary`] wires the pieces together: the coordinator delivers
//! into [`LibraryStateStore::merge_statuses`], and a background task follows
//! the store's pending set and reconfigures the coordinator whenever it
//! changes. Documents that reach READY or ERROR therefore drop out of the
//! target set, and polling idles once nothing is pending.

use crate::config::{LibrarySettings, PollingSettings};
use crate::error::LibraryError;
use crate::models::{Document, DocumentPatch, Page, PendingSet, StatusUpdate, ViewMode};
use crate::polling::{PollingCoordinator, StatusCallback};
use crate::services::DocumentUploader;
use crate::store::LibraryStateStore;
use crate::upload::UploadFlow;
use crate::utils::lock;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryView {
    pub documents: Vec<Document>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub view_mode: ViewMode,
}

pub struct DocumentLibrary {
    store: Arc<LibraryStateStore>,
    coordinator: Arc<PollingCoordinator>,
    initial_page: u32,
    view_mode: Mutex<ViewMode>,
    wiring: CancellationToken,
    wiring_gate: Arc<Mutex<()>>,
}

impl DocumentLibrary {
    /// Connect `store` and `coordinator` and start following the pending set.
    ///
    /// Must be called within a tokio runtime.
    pub fn mount(
        store: Arc<LibraryStateStore>,
        coordinator: Arc<PollingCoordinator>,
        library: &LibrarySettings,
        polling: &PollingSettings,
    ) -> Self {
        let sink = store.clone();
        let callback: StatusCallback = Arc::new(move |updates: Vec<StatusUpdate>| {
            sink.merge_statuses(&updates);
        });
        coordinator.set_callback(callback);

        let mut pending = store.subscribe_pending();
        let initial = pending.borrow_and_update().to_vec();
        coordinator.reconfigure(&initial, polling.enabled);

        let wiring = CancellationToken::new();
        let wiring_gate = Arc::new(Mutex::new(()));
        tokio::spawn(follow_pending(
            pending,
            coordinator.clone(),
            polling.enabled,
            wiring.clone(),
            wiring_gate.clone(),
        ));

        tracing::debug!(
            enabled = polling.enabled,
            interval_ms = polling.interval_ms,
            "Document library mounted"
        );

        Self {
            store,
            coordinator,
            initial_page: library.initial_page.max(1),
            view_mode: Mutex::new(ViewMode::default()),
            wiring,
            wiring_gate,
        }
    }

    pub fn store(&self) -> &Arc<LibraryStateStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<PollingCoordinator> {
        &self.coordinator
    }

    /// Fetch the initial page.
    pub async fn load(&self) -> Result<Page, LibraryError> {
        self.store.fetch_page(self.initial_page).await
    }

    pub fn view(&self) -> LibraryView {
        let snapshot = self.store.snapshot();
        let view_mode = *lock(&self.view_mode);
        match snapshot.page {
            Some(page) => LibraryView {
                documents: page.items,
                is_loading: snapshot.is_loading,
                error: snapshot.error,
                current_page: page.current_page,
                total_pages: page.total_pages,
                page_size: page.page_size,
                total_count: page.total_count,
                view_mode,
            },
            None => LibraryView {
                documents: Vec::new(),
                is_loading: snapshot.is_loading,
                error: snapshot.error,
                current_page: self.initial_page,
                total_pages: 0,
                page_size: self.store.page_size(),
                total_count: 0,
                view_mode,
            },
        }
    }

    pub async fn change_page(&self, page: u32) -> Option<Result<Page, LibraryError>> {
        self.store.change_page(page).await
    }

    pub async fn retry(&self) -> Result<Page, LibraryError> {
        self.store.retry().await
    }

    pub async fn refresh(&self) -> Result<Page, LibraryError> {
        self.store.refresh().await
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        *lock(&self.view_mode) = mode;
    }

    pub fn replace_all(&self, documents: Vec<Document>) {
        self.store.replace_all(documents);
    }

    pub fn patch_one(&self, id: &str, patch: &DocumentPatch) -> bool {
        self.store.patch_one(id, patch)
    }

    /// An upload flow that refreshes this library on success.
    pub fn upload_flow(&self, uploader: Arc<dyn DocumentUploader>) -> UploadFlow {
        UploadFlow::new(uploader, self.store.clone())
    }

    /// Stop following the pending set and dispose the active poll. No status
    /// batch reaches the store after this returns.
    pub fn unmount(&self) {
        {
            let _gate = lock(&self.wiring_gate);
            self.wiring.cancel();
        }
        self.coordinator.stop();
    }
}

impl Drop for DocumentLibrary {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn follow_pending(
    mut pending: watch::Receiver<PendingSet>,
    coordinator: Arc<PollingCoordinator>,
    enabled: bool,
    token: CancellationToken,
    gate: Arc<Mutex<()>>,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            changed = pending.changed() => {
                if changed.is_err() {
                    break;
                }
                let ids = pending.borrow_and_update().to_vec();
                let _gate = lock(&gate);
                if token.is_cancelled() {
                    break;
                }
                tracing::debug!(pending = ids.len(), "Pending set changed");
                coordinator.reconfigure(&ids, enabled);
            }
        }
    }
}
