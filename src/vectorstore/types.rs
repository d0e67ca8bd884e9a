//! Shared types used by the index client and the adapter.

use std::fmt;
use std::str::FromStr;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::fetch::Quality;
use crate::metadata::FlatMetadata;
use crate::retry::Retryable;

/// Errors returned while interacting with the vector index.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Index responded with an unexpected status code.
    #[error("Unexpected index response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the index.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A record violated an internal invariant before upsert; nothing was committed.
    #[error("Invalid vector record: {0}")]
    InvalidRecord(String),
    /// An upsert batch kept failing after retries and a split.
    #[error("Upsert batch {batch} failed after retries")]
    BatchFailed {
        /// Zero-based batch index within the call.
        batch: usize,
    },
}

impl Retryable for VectorStoreError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidRecord(_) | Self::BatchFailed { .. } => false,
        }
    }
}

/// Document source a vector originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Designation-report PDF.
    Pdf,
    /// Wikipedia article.
    Wikipedia,
}

impl SourceType {
    /// Metadata value stored under `source_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Wikipedia => "wikipedia",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "wikipedia" => Ok(Self::Wikipedia),
            _ => Err(()),
        }
    }
}

/// Attribution context for a Wikipedia-sourced chunk.
#[derive(Debug, Clone)]
pub struct ArticleContext {
    /// Article title as reported by the catalog.
    pub title: String,
    /// Article URL.
    pub url: String,
    /// Revision the text was extracted from.
    pub revision_id: String,
    /// Optional quality prediction for the revision.
    pub quality: Option<Quality>,
}

/// Tagged source variant consumed by the adapter when producing IDs and metadata.
#[derive(Debug, Clone)]
pub enum SourceKind {
    /// Designation-report PDF.
    Pdf,
    /// Wikipedia article with attribution context.
    Wikipedia(ArticleContext),
}

impl SourceKind {
    /// The plain source type of this kind.
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Pdf => SourceType::Pdf,
            Self::Wikipedia(_) => SourceType::Wikipedia,
        }
    }

    /// Article context, when this kind is Wikipedia.
    pub fn article(&self) -> Option<&ArticleContext> {
        match self {
            Self::Pdf => None,
            Self::Wikipedia(article) => Some(article),
        }
    }
}

/// A chunk ready for storage: text, position, and its embedding.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    /// Chunk text content.
    pub text: String,
    /// Zero-based position within the document.
    pub index: usize,
    /// Total chunks produced for the document.
    pub total: usize,
    /// Token count measured by the chunker.
    pub token_count: usize,
    /// Embedding vector produced for the chunk.
    pub embedding: Vec<f32>,
    /// Chunk-scoped metadata merged beneath the landmark metadata.
    pub metadata: FlatMetadata,
}

/// Prepared record ready for upsert.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Deterministic identifier.
    pub id: String,
    /// Embedding values.
    pub values: Vec<f32>,
    /// Flat payload stored alongside the vector.
    pub metadata: FlatMetadata,
}

/// Uniform match shape returned by queries and fetches.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    /// Identifier assigned to the vector.
    pub id: String,
    /// Similarity score; `0.0` for metadata-only listings and fetches.
    pub score: f32,
    /// Stored payload.
    pub metadata: Map<String, Value>,
    /// Embedding values, when requested.
    pub values: Option<Vec<f32>>,
}

/// Parameters accepted by [`crate::vectorstore::VectorStoreAdapter::query`].
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    /// Query embedding. `None` performs a metadata-only listing.
    pub vector: Option<Vec<f32>>,
    /// Maximum results to return.
    pub top_k: usize,
    /// Caller-supplied filter, ANDed with the constraints below.
    pub filter: Option<Value>,
    /// Exact-match constraint on `landmark_id`.
    pub landmark_id: Option<String>,
    /// Exact-match constraint on `source_type`.
    pub source_type: Option<SourceType>,
    /// Case-insensitive prefix constraint applied to returned IDs.
    pub id_prefix: Option<String>,
    /// Whether to return embedding values with each match.
    pub include_values: bool,
    /// Correlation ID attached to the paired query log events.
    pub correlation_id: Option<String>,
}

/// Result of validating a stored vector.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Identifier that was validated.
    pub id: String,
    /// Whether the vector exists in the index.
    pub exists: bool,
    /// Whether the ID matches the expected deterministic pattern.
    pub id_well_formed: bool,
    /// Required metadata keys that are absent.
    pub missing_keys: Vec<String>,
    /// Whether embedding values are present with the expected dimension.
    pub dimension_ok: bool,
}

impl ValidationReport {
    /// Whether every check passed.
    pub fn is_valid(&self) -> bool {
        self.exists && self.id_well_formed && self.missing_keys.is_empty() && self.dimension_ok
    }
}

/// Aggregate statistics reported by the index.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Index dimensionality.
    #[serde(default)]
    pub dimension: Option<usize>,
    /// Total vectors stored across namespaces.
    #[serde(default)]
    pub total_vector_count: u64,
}

// Wire DTOs.

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub(crate) matches: Vec<WireMatch>,
}

#[derive(Deserialize)]
pub(crate) struct WireMatch {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub(crate) values: Option<Vec<f32>>,
}

impl WireMatch {
    pub(crate) fn into_match(self) -> VectorMatch {
        VectorMatch {
            id: self.id,
            score: self.score,
            metadata: self.metadata.unwrap_or_default(),
            values: self.values,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct UpsertResponse {
    #[serde(default, rename = "upsertedCount")]
    pub(crate) upserted_count: usize,
}

#[derive(Deserialize)]
pub(crate) struct FetchResponse {
    #[serde(default)]
    pub(crate) vectors: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_parses_case_insensitively() {
        assert_eq!("PDF".parse::<SourceType>(), Ok(SourceType::Pdf));
        assert_eq!("Wikipedia".parse::<SourceType>(), Ok(SourceType::Wikipedia));
        assert!("html".parse::<SourceType>().is_err());
    }

    #[test]
    fn validation_report_requires_all_checks() {
        let report = ValidationReport {
            id: "LP-00001-chunk-0".into(),
            exists: true,
            id_well_formed: true,
            missing_keys: vec![],
            dimension_ok: true,
        };
        assert!(report.is_valid());

        let missing = ValidationReport {
            missing_keys: vec!["text".into()],
            ..report
        };
        assert!(!missing.is_valid());
    }
}
