pub mod documents;

pub use documents::{
    DocumentDto, DocumentListParams, DocumentListResponse, DocumentStatus, SearchParams,
    SearchResponse, SortBy, StatusDto, StatusQueryParams, UploadResponse,
};
