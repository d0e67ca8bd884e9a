//! Source document fetchers.
//!
//! Three external surfaces feed the pipeline: designation-report PDFs, Wikipedia
//! article pages, and the article-quality prediction service. Each fetcher owns a
//! pooled `reqwest` client configured with the timeouts from [`crate::config`] and
//! retries transient failures through [`crate::retry::with_retry`].

pub mod pdf;
pub mod quality;
pub mod wikipedia;

pub use pdf::{PdfFetcher, extract_text};
pub use quality::{Quality, QualityClass, QualityClassifier};
pub use wikipedia::WikipediaFetcher;

use reqwest::StatusCode;
use thiserror::Error;

use crate::retry::Retryable;

/// Errors raised while downloading source documents.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Source host responded with an unexpected status code.
    #[error("Unexpected response ({status}) from {url}")]
    UnexpectedStatus {
        /// HTTP status returned by the host.
        status: StatusCode,
        /// Requested URL, for diagnostics.
        url: String,
    },
    /// Download exceeded the configured size cap.
    #[error("Document at {url} exceeds the {limit}-byte cap")]
    Oversize {
        /// Configured byte limit.
        limit: u64,
        /// Requested URL.
        url: String,
    },
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Oversize { .. } => false,
        }
    }
}
