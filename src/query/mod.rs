//! Query service composing embedding, filtered search, and source attribution.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::{CatalogClient, LandmarkId};
use crate::embedding::{EmbeddingClient, EmbeddingError, HttpEmbeddingClient};
use crate::vectorstore::{
    QueryArgs, SourceType, VectorMatch, VectorStoreAdapter, VectorStoreError, source_type_of_id,
};

/// Default number of matches returned when the caller omits `top_k`.
pub const DEFAULT_TOP_K: usize = 5;
/// Upper bound accepted for `top_k`.
pub const MAX_TOP_K: usize = 25;

/// Lifetime of cached landmark display names.
const NAME_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors surfaced by the query pipeline.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The request failed validation; maps to HTTP 400.
    #[error("{0}")]
    Validation(String),
    /// The embedding provider failed; maps to HTTP 502.
    #[error("Embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),
    /// The vector index failed; maps to HTTP 502.
    #[error("Vector store failed: {0}")]
    Store(#[from] VectorStoreError),
}

/// A semantic search request.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// Natural-language query text.
    pub query_text: String,
    /// Maximum matches to return (`1..=25`, default 5).
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Optional exact-match landmark constraint.
    #[serde(default)]
    pub landmark_id: Option<String>,
    /// Optional source constraint (`"pdf"` or `"wikipedia"`).
    #[serde(default)]
    pub source_type: Option<String>,
}

/// One enriched search match returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMatch {
    /// Vector identifier.
    pub id: String,
    /// Similarity score.
    pub score: f32,
    /// Owning landmark.
    pub landmark_id: String,
    /// Display name resolved from the catalog; empty when the lookup failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmark_name: Option<String>,
    /// Source the chunk came from.
    pub source_type: String,
    /// Chunk text.
    pub text: String,
    /// Article title, for Wikipedia-sourced chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_title: Option<String>,
    /// Article URL, for Wikipedia-sourced chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_url: Option<String>,
}

/// Abstraction over the query pipeline consumed by the HTTP surface.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Validate and execute a search, returning enriched matches.
    async fn query(
        &self,
        request: QueryRequest,
        correlation_id: &str,
    ) -> Result<Vec<QueryMatch>, QueryError>;
}

/// Production query service backed by the embedding provider, the vector index, and
/// a name-enrichment cache over the catalog.
pub struct QueryService {
    pub(crate) embeddings: Box<dyn EmbeddingClient>,
    pub(crate) store: VectorStoreAdapter,
    pub(crate) catalog: Arc<CatalogClient>,
    pub(crate) names: Cache<String, String>,
}

impl QueryService {
    /// Construct a service wired to the configured external services.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            embeddings: Box::new(HttpEmbeddingClient::new()?),
            store: VectorStoreAdapter::new()?,
            catalog: Arc::new(CatalogClient::new()?),
            names: Cache::builder()
                .time_to_live(NAME_CACHE_TTL)
                .max_capacity(20_000)
                .build(),
        })
    }

    fn validate(request: &QueryRequest) -> Result<(usize, Option<SourceType>), QueryError> {
        if request.query_text.trim().is_empty() {
            return Err(QueryError::Validation(
                "query_text must not be empty".into(),
            ));
        }

        let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(QueryError::Validation(format!(
                "top_k must be between 1 and {MAX_TOP_K}"
            )));
        }

        let source_type = request
            .source_type
            .as_deref()
            .map(|raw| {
                SourceType::from_str(raw).map_err(|()| {
                    QueryError::Validation(format!(
                        "source_type must be \"pdf\" or \"wikipedia\", got \"{raw}\""
                    ))
                })
            })
            .transpose()?;

        Ok((top_k, source_type))
    }

    /// Resolve a landmark display name through the cache. Failures leave the name
    /// unset and never fail the request.
    async fn display_name(&self, landmark_id: &str) -> Option<String> {
        if let Some(name) = self.names.get(landmark_id).await {
            return Some(name);
        }

        let id = LandmarkId::normalize(landmark_id).ok()?;
        match self.catalog.get_landmark(&id).await {
            Ok(Some(landmark)) => {
                self.names
                    .insert(landmark_id.to_string(), landmark.name.clone())
                    .await;
                Some(landmark.name)
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(landmark_id, error = %error, "Name enrichment lookup failed");
                None
            }
        }
    }

    async fn enrich(&self, entry: VectorMatch) -> QueryMatch {
        let metadata = &entry.metadata;
        let landmark_id = metadata
            .get("landmark_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let source_type = metadata
            .get("source_type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| source_type_of_id(&entry.id).as_str().to_string());
        let text = metadata
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let article_title = metadata
            .get("article_title")
            .and_then(Value::as_str)
            .map(str::to_string);
        let article_url = metadata
            .get("article_url")
            .and_then(Value::as_str)
            .map(str::to_string);
        let landmark_name = if landmark_id.is_empty() {
            None
        } else {
            self.display_name(&landmark_id).await
        };

        QueryMatch {
            id: entry.id,
            score: entry.score,
            landmark_id,
            landmark_name,
            source_type,
            text,
            article_title,
            article_url,
        }
    }
}

#[async_trait]
impl QueryApi for QueryService {
    async fn query(
        &self,
        request: QueryRequest,
        correlation_id: &str,
    ) -> Result<Vec<QueryMatch>, QueryError> {
        let (top_k, source_type) = Self::validate(&request)?;

        let vector = self.embeddings.embed_one(request.query_text.trim()).await?;
        let matches = self
            .store
            .query(QueryArgs {
                vector: Some(vector),
                top_k,
                filter: None,
                landmark_id: request.landmark_id.clone(),
                source_type,
                id_prefix: None,
                include_values: false,
                correlation_id: Some(correlation_id.to_string()),
            })
            .await?;

        let mut enriched = Vec::with_capacity(matches.len());
        for entry in matches {
            enriched.push(self.enrich(entry).await);
        }
        Ok(enriched)
    }
}
