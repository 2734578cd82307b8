//! Error taxonomy for calls to the library service.
//!
//! | Variant | Cause | Retryable |
//! |---------|-------|-----------|
//! | `Transport` | network unreachable, aborted, timed out | yes |
//! | `Http` | non-2xx response | 5xx only |
//! | `Decode` | malformed response body | no |
//! | `Io` | reading a local file for upload | no |
//! | `Config` | client configuration | no |
//!
//! An id missing from a batch status response is not an error.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error occurred. Check your internet connection.";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{message}")]
    Transport { message: String },

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Invalid response from library service: {0}")]
    Decode(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LibraryError {
    pub fn transport() -> Self {
        LibraryError::Transport {
            message: NETWORK_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        LibraryError::Http {
            status: status.as_u16(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            LibraryError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            LibraryError::Transport { .. } => true,
            LibraryError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Build an error from a non-2xx response, preferring the message the
    /// server put in its body.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = body_message(&body)
            .unwrap_or_else(|| HttpErrorCategory::from_status(status).message().to_string());

        LibraryError::http(status, message)
    }
}

impl From<reqwest::Error> for LibraryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LibraryError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            LibraryError::http(status, HttpErrorCategory::from_status(status).message())
        } else {
            tracing::debug!(error = %err, "Transport failure");
            LibraryError::transport()
        }
    }
}

/// Fixed human-readable categories for HTTP failures without a body message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorCategory {
    AuthRequired,
    Forbidden,
    PayloadTooLarge,
    UnsupportedMediaType,
    ServerError,
    RequestFailed,
}

impl HttpErrorCategory {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => HttpErrorCategory::AuthRequired,
            403 => HttpErrorCategory::Forbidden,
            413 => HttpErrorCategory::PayloadTooLarge,
            415 => HttpErrorCategory::UnsupportedMediaType,
            s if s >= 500 => HttpErrorCategory::ServerError,
            _ => HttpErrorCategory::RequestFailed,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            HttpErrorCategory::AuthRequired => {
                "Authentication required. Please log in and try again."
            }
            HttpErrorCategory::Forbidden => "You do not have permission to perform this action.",
            HttpErrorCategory::PayloadTooLarge => "The file is too large.",
            HttpErrorCategory::UnsupportedMediaType => {
                "Unsupported file type. Only PDF files can be uploaded."
            }
            HttpErrorCategory::ServerError => "A server error occurred. Please try again later.",
            HttpErrorCategory::RequestFailed => "The request to the library service failed.",
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn body_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error
        .or(parsed.message)
        .filter(|message| !message.trim().is_empty())
}
