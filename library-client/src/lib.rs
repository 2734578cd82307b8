pub mod config;
pub mod error;
pub mod library;
pub mod models;
pub mod polling;
pub mod search;
pub mod services;
pub mod store;
pub mod upload;
mod utils;

#[cfg(test)]
mod test_support;

pub use error::LibraryError;
pub use library::{DocumentLibrary, LibraryView};
pub use polling::{PollPhase, PollSubscription, PollingCoordinator, StatusCallback};
pub use search::{SearchCoordinator, SearchState};
pub use store::{LibrarySnapshot, LibraryStateStore};
pub use upload::{UploadFlow, UploadState, UploadStatus};
