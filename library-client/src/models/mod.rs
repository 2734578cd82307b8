pub mod document;
pub mod page;

pub use document::{
    Document, DocumentPatch, PaginatedDocumentsResponse, ProcessingStatus, SearchRequest,
    SearchResponse, SortOrder, StatusUpdate, UploadFile, UploadReceipt, ViewMode,
};
pub use page::{Page, PendingSet};
