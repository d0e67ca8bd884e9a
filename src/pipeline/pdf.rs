//! PDF designation-report processor.

use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::{CatalogClient, LandmarkId};
use crate::config::get_config;
use crate::embedding::{EmbeddingClient, HttpEmbeddingClient};
use crate::fetch::{PdfFetcher, extract_text};
use crate::metadata::{CollectError, MetadataCollector};
use crate::pipeline::chunker::Chunker;
use crate::pipeline::types::{LandmarkProcessor, Outcome, ProcessingResult};
use crate::vectorstore::{EmbeddedChunk, SourceKind, SourceType, VectorStoreAdapter};

/// Composes catalog → PDF fetch → chunk → metadata → embed → store for one landmark.
pub struct PdfProcessor {
    pub(crate) catalog: Arc<CatalogClient>,
    pub(crate) fetcher: PdfFetcher,
    pub(crate) chunker: Chunker,
    pub(crate) collector: MetadataCollector,
    pub(crate) embeddings: Box<dyn EmbeddingClient>,
    pub(crate) store: VectorStoreAdapter,
    pub(crate) chunk_size: usize,
    pub(crate) overlap: usize,
    pub(crate) replace_existing: bool,
}

impl PdfProcessor {
    /// Construct a processor wired to the configured external services.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = get_config();
        let catalog = Arc::new(CatalogClient::new()?);
        Ok(Self {
            collector: MetadataCollector::new(catalog.clone()),
            catalog,
            fetcher: PdfFetcher::new()?,
            chunker: Chunker::new()?,
            embeddings: Box::new(HttpEmbeddingClient::new()?),
            store: VectorStoreAdapter::new()?,
            chunk_size: config.chunk_size_tokens,
            overlap: config.chunk_overlap_tokens,
            replace_existing: config.delete_existing_on_reprocess,
        })
    }

    /// Override whether previously stored vectors are replaced on reprocess.
    pub fn with_replace_existing(mut self, replace_existing: bool) -> Self {
        self.replace_existing = replace_existing;
        self
    }

    async fn ingest(&self, id: &LandmarkId) -> Result<Outcome, String> {
        let landmark = self
            .catalog
            .get_landmark(id)
            .await
            .map_err(|error| error.to_string())?
            .ok_or_else(|| "not_found".to_string())?;

        let Some(url) = landmark.pdf_report_url else {
            tracing::debug!(landmark_id = %id, "No designation report published");
            return Ok(Outcome::NoContent);
        };

        let bytes = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|error| error.to_string())?;
        let text = extract_text(&bytes);
        if text.is_empty() {
            tracing::debug!(landmark_id = %id, url, "Report has no extractable text");
            return Ok(Outcome::NoContent);
        }

        let chunks = self
            .chunker
            .chunk(&text, self.chunk_size, self.overlap)
            .map_err(|error| error.to_string())?;
        if chunks.is_empty() {
            return Ok(Outcome::NoContent);
        }

        let metadata = self.collector.collect(id).await.map_err(|error| match error {
            CollectError::NotFound(_) => "not_found".to_string(),
            other => other.to_string(),
        })?;

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self
            .embeddings
            .embed(&texts)
            .await
            .map_err(|error| error.to_string())?;

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| EmbeddedChunk {
                text: chunk.text,
                index: chunk.index,
                total: chunk.total,
                token_count: chunk.token_count,
                embedding,
                metadata: Default::default(),
            })
            .collect();

        let ids = self
            .store
            .store_chunks(id, &SourceKind::Pdf, &embedded, &metadata, self.replace_existing)
            .await
            .map_err(|error| error.to_string())?;

        Ok(Outcome::Stored {
            chunks: ids.len(),
            documents: 1,
            errors: Vec::new(),
        })
    }
}

#[async_trait]
impl LandmarkProcessor for PdfProcessor {
    fn source_type(&self) -> SourceType {
        SourceType::Pdf
    }

    async fn process_landmark(&self, id: &LandmarkId) -> ProcessingResult {
        tracing::info!(
            operation = "landmark_process_start",
            module = "pipeline",
            landmark_id = %id,
            source_type = "pdf",
            "Processing landmark"
        );

        let outcome = self
            .ingest(id)
            .await
            .unwrap_or_else(|reason| Outcome::Failed { reason });
        let result = ProcessingResult::from_outcome(id.clone(), outcome);

        tracing::info!(
            operation = "landmark_process_complete",
            module = "pipeline",
            landmark_id = %id,
            source_type = "pdf",
            success = result.success,
            chunks = result.chunks,
            "Landmark processed"
        );
        result
    }
}
