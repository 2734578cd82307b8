use crate::error::LibraryError;
use crate::models::UploadFile;
use crate::services::DocumentUploader;
use crate::store::LibraryStateStore;
use crate::utils::lock;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub const NO_FILE_SELECTED_MESSAGE: &str = "No file selected for upload.";
pub const DEFAULT_SUCCESS_MESSAGE: &str = "File uploaded successfully. Processing has started.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Success,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadState {
    pub status: UploadStatus,
    pub file_name: Option<String>,
    pub message: Option<String>,
    pub document_id: Option<String>,
}

/// Upload state machine: `Idle -> Uploading -> Success | Error`.
///
/// A successful upload re-fetches the store's current page so the new
/// document enters the pending set and starts being polled.
pub struct UploadFlow {
    uploader: Arc<dyn DocumentUploader>,
    store: Arc<LibraryStateStore>,
    file: Mutex<Option<UploadFile>>,
    state: watch::Sender<UploadState>,
}

impl UploadFlow {
    pub fn new(uploader: Arc<dyn DocumentUploader>, store: Arc<LibraryStateStore>) -> Self {
        let (state, _) = watch::channel(UploadState::default());
        Self {
            uploader,
            store,
            file: Mutex::new(None),
            state,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    pub fn select_file(&self, file: UploadFile) {
        let file_name = file.file_name.clone();
        *lock(&self.file) = Some(file);
        self.state.send_replace(UploadState {
            file_name: Some(file_name),
            ..Default::default()
        });
    }

    /// Upload the selected file and return the resulting state.
    pub async fn start(&self) -> UploadState {
        let Some(file) = lock(&self.file).clone() else {
            tracing::warn!("Upload started without a selected file");
            self.state.send_modify(|state| {
                state.status = UploadStatus::Error;
                state.message = Some(NO_FILE_SELECTED_MESSAGE.to_string());
            });
            return self.state();
        };

        self.state.send_modify(|state| {
            state.status = UploadStatus::Uploading;
            state.message = None;
            state.document_id = None;
        });
        tracing::info!(file_name = %file.file_name, bytes = file.bytes.len(), "Uploading document");

        match self.uploader.upload_document(&file).await {
            Ok(receipt) if !receipt.success => {
                tracing::warn!(
                    file_name = %file.file_name,
                    message = %receipt.message,
                    "Upload rejected"
                );
                self.state.send_modify(|state| {
                    state.status = UploadStatus::Error;
                    state.message = Some(receipt.message);
                });
            }
            Ok(receipt) => {
                tracing::info!(
                    file_name = %file.file_name,
                    document_id = ?receipt.document_id,
                    "Document uploaded"
                );
                let message = if receipt.message.is_empty() {
                    DEFAULT_SUCCESS_MESSAGE.to_string()
                } else {
                    receipt.message
                };
                self.state.send_modify(|state| {
                    state.status = UploadStatus::Success;
                    state.message = Some(message);
                    state.document_id = receipt.document_id;
                });

                if let Err(e) = self.store.refresh().await {
                    tracing::warn!(error = %e, "Failed to refresh library after upload");
                }
            }
            Err(e) => self.fail(&file, e),
        }

        self.state()
    }

    pub fn reset(&self) {
        lock(&self.file).take();
        self.state.send_replace(UploadState::default());
    }

    fn fail(&self, file: &UploadFile, error: LibraryError) {
        tracing::warn!(file_name = %file.file_name, error = %error, "Upload failed");
        self.state.send_modify(|state| {
            state.status = UploadStatus::Error;
            state.message = Some(error.to_string());
        });
    }
}
