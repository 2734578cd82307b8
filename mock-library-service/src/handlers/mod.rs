pub mod documents;
pub mod health;

pub use documents::{
    document_status, document_statuses, list_documents, search_documents, upload_document,
};
pub use health::health_check;
