pub mod library_api;
pub mod metrics;

pub use library_api::{
    DocumentUploader, HttpLibraryClient, LibraryPageSource, LibrarySearchSource,
    StatusQueryClient,
};
