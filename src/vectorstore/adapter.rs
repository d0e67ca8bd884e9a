//! The vector store adapter: the only component permitted to mutate the index.

use serde_json::Value;

use crate::catalog::LandmarkId;
use crate::config::get_config;
use crate::metadata::FlatMetadata;
use crate::retry::{RetryPolicy, with_retry};
use crate::vectorstore::client::IndexClient;
use crate::vectorstore::filters::{compose_filter, replace_filter};
use crate::vectorstore::ids::id_is_well_formed;
use crate::vectorstore::records::{build_records, current_timestamp_rfc3339, validate_record};
use crate::vectorstore::types::{
    EmbeddedChunk, IndexStats, QueryArgs, SourceKind, SourceType, ValidationReport, VectorMatch,
    VectorRecord, VectorStoreError,
};

/// Metadata keys every stored vector must carry.
const REQUIRED_KEYS: [&str; 6] = [
    "landmark_id",
    "source_type",
    "chunk_index",
    "total_chunks",
    "processing_date",
    "text",
];

/// Additional keys required on Wikipedia-sourced vectors.
const REQUIRED_WIKI_KEYS: [&str; 3] = ["article_title", "article_url", "article_revision_id"];

/// Cap applied when counting matches ahead of a filtered delete.
const DELETE_COUNT_LIMIT: usize = 10_000;

/// Encapsulates the external vector index behind chunk/ID invariants.
pub struct VectorStoreAdapter {
    pub(crate) client: IndexClient,
    pub(crate) dimension: usize,
    pub(crate) upsert_batch_size: usize,
    pub(crate) upsert_retry: RetryPolicy,
    pub(crate) retry: RetryPolicy,
}

impl VectorStoreAdapter {
    /// Construct an adapter using configuration derived from the environment.
    pub fn new() -> Result<Self, VectorStoreError> {
        let config = get_config();
        Ok(Self {
            client: IndexClient::new()?,
            dimension: config.embedding_dimension,
            upsert_batch_size: config.upsert_batch_size,
            upsert_retry: RetryPolicy::default()
                .with_max_attempts(config.upsert_max_retries as u32),
            retry: RetryPolicy::default(),
        })
    }

    /// Store embedded chunks for one `(landmark, source)` ingestion.
    ///
    /// When `replace_existing` is set, vectors previously stored for the same scope
    /// (landmark + source, plus article title for Wikipedia) are deleted first; the
    /// deletion is acknowledged before the first upsert is issued. Returns the
    /// deterministic IDs assigned to each chunk, in chunk order.
    pub async fn store_chunks(
        &self,
        landmark_id: &LandmarkId,
        kind: &SourceKind,
        chunks: &[EmbeddedChunk],
        landmark_metadata: &FlatMetadata,
        replace_existing: bool,
    ) -> Result<Vec<String>, VectorStoreError> {
        if replace_existing {
            let filter = replace_filter(landmark_id.as_str(), kind);
            let deleted = self.delete_by_filter(filter).await?;
            tracing::debug!(
                landmark_id = %landmark_id,
                source_type = %kind.source_type(),
                deleted,
                "Cleared existing vectors before storing"
            );
        }

        let processing_date = current_timestamp_rfc3339();
        let records = build_records(landmark_id, kind, chunks, landmark_metadata, &processing_date);
        for record in &records {
            validate_record(record, self.dimension)?;
        }

        let ids: Vec<String> = records.iter().map(|record| record.id.clone()).collect();
        for (batch_index, batch) in records.chunks(self.upsert_batch_size).enumerate() {
            self.upsert_batch(batch, batch_index).await?;
        }
        Ok(ids)
    }

    /// Upsert one batch under the configured retry budget, splitting into halves for
    /// a final attempt before giving up.
    async fn upsert_batch(
        &self,
        batch: &[VectorRecord],
        batch_index: usize,
    ) -> Result<(), VectorStoreError> {
        let outcome = with_retry("upsert_batch", self.upsert_retry, || {
            self.client.upsert(batch)
        })
        .await;

        match outcome {
            Ok(count) => {
                tracing::info!(
                    operation = "upsert_batch",
                    module = "vectorstore",
                    batch = batch_index,
                    vectors = count,
                    "Upserted batch"
                );
                Ok(())
            }
            Err(error) if batch.len() > 1 => {
                tracing::warn!(
                    batch = batch_index,
                    vectors = batch.len(),
                    error = %error,
                    "Batch upsert failed after retries; splitting into halves"
                );
                let mid = batch.len() / 2;
                for half in [&batch[..mid], &batch[mid..]] {
                    if let Err(error) = self.client.upsert(half).await {
                        tracing::error!(
                            batch = batch_index,
                            error = %error,
                            "Half-batch upsert failed"
                        );
                        return Err(VectorStoreError::BatchFailed { batch: batch_index });
                    }
                }
                tracing::info!(
                    operation = "upsert_batch",
                    module = "vectorstore",
                    batch = batch_index,
                    vectors = batch.len(),
                    "Upserted batch after split"
                );
                Ok(())
            }
            Err(error) => {
                tracing::error!(batch = batch_index, error = %error, "Batch upsert failed");
                Err(VectorStoreError::BatchFailed { batch: batch_index })
            }
        }
    }

    /// Delete all vectors matching `filter`, returning how many matched beforehand.
    /// A filter matching nothing is a no-op returning zero.
    pub async fn delete_by_filter(&self, filter: Value) -> Result<usize, VectorStoreError> {
        let matched = with_retry("vector_list", self.retry, || {
            self.client
                .query(None, DELETE_COUNT_LIMIT, Some(&filter), false)
        })
        .await?
        .len();

        if matched == 0 {
            return Ok(0);
        }

        with_retry("vector_delete", self.retry, || {
            self.client.delete_by_filter(&filter)
        })
        .await?;
        tracing::debug!(deleted = matched, "Deleted vectors by filter");
        Ok(matched)
    }

    /// Filtered similarity query, or a metadata-only listing when `args.vector` is
    /// `None`. Emits paired `vector_query_start`/`vector_query_complete` events
    /// carrying the supplied correlation ID.
    pub async fn query(&self, args: QueryArgs) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let QueryArgs {
            vector,
            top_k,
            filter,
            landmark_id,
            source_type,
            id_prefix,
            include_values,
            correlation_id,
        } = args;

        let filter = compose_filter(filter, landmark_id.as_deref(), source_type);
        let listing = vector.is_none();

        match correlation_id.as_deref() {
            Some(cid) => tracing::info!(
                operation = "vector_query_start",
                module = "vectorstore",
                correlation_id = %cid,
                top_k,
                listing,
                filtered = filter.is_some(),
                "Vector query started"
            ),
            None => tracing::info!(
                operation = "vector_query_start",
                module = "vectorstore",
                top_k,
                listing,
                filtered = filter.is_some(),
                "Vector query started"
            ),
        }

        let mut matches = with_retry("vector_query", self.retry, || {
            self.client
                .query(vector.as_deref(), top_k, filter.as_ref(), include_values)
        })
        .await?;

        if let Some(prefix) = id_prefix
            .as_deref()
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
        {
            let prefix = prefix.to_lowercase();
            matches.retain(|entry| entry.id.to_lowercase().starts_with(&prefix));
        }
        matches.truncate(top_k);

        match correlation_id.as_deref() {
            Some(cid) => tracing::info!(
                operation = "vector_query_complete",
                module = "vectorstore",
                correlation_id = %cid,
                matches = matches.len(),
                "Vector query complete"
            ),
            None => tracing::info!(
                operation = "vector_query_complete",
                module = "vectorstore",
                matches = matches.len(),
                "Vector query complete"
            ),
        }

        Ok(matches)
    }

    /// Fetch one vector by ID.
    pub async fn get(&self, id: &str) -> Result<Option<VectorMatch>, VectorStoreError> {
        let ids = [id.to_string()];
        let mut matches = with_retry("vector_fetch", self.retry, || self.client.fetch(&ids)).await?;
        Ok(matches.pop())
    }

    /// Validate a stored vector: ID shape, metadata completeness, and dimension.
    pub async fn validate(&self, id: &str) -> Result<ValidationReport, VectorStoreError> {
        let id_well_formed = id_is_well_formed(id);
        let Some(stored) = self.get(id).await? else {
            return Ok(ValidationReport {
                id: id.to_string(),
                exists: false,
                id_well_formed,
                missing_keys: REQUIRED_KEYS.iter().map(|key| key.to_string()).collect(),
                dimension_ok: false,
            });
        };

        let mut missing_keys: Vec<String> = REQUIRED_KEYS
            .iter()
            .filter(|key| !stored.metadata.contains_key(**key))
            .map(|key| key.to_string())
            .collect();
        let is_wiki = stored
            .metadata
            .get("source_type")
            .and_then(Value::as_str)
            .is_some_and(|value| value == SourceType::Wikipedia.as_str());
        if is_wiki {
            missing_keys.extend(
                REQUIRED_WIKI_KEYS
                    .iter()
                    .filter(|key| !stored.metadata.contains_key(**key))
                    .map(|key| key.to_string()),
            );
        }

        let dimension_ok = stored
            .values
            .as_ref()
            .is_some_and(|values| values.len() == self.dimension);

        Ok(ValidationReport {
            id: id.to_string(),
            exists: true,
            id_well_formed,
            missing_keys,
            dimension_ok,
        })
    }

    /// Aggregate index statistics.
    pub async fn stats(&self) -> Result<IndexStats, VectorStoreError> {
        with_retry("vector_stats", self.retry, || {
            self.client.describe_index_stats()
        })
        .await
    }
}
