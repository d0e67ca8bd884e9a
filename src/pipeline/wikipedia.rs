//! Wikipedia article processor.
//!
//! A landmark with zero Wikipedia references is a first-class success. When a
//! landmark has several articles, per-article failures are recorded and the
//! remaining articles still make it into the index.

use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::{CatalogClient, LandmarkId, WikipediaArticleRef};
use crate::config::get_config;
use crate::embedding::{EmbeddingClient, HttpEmbeddingClient};
use crate::fetch::{QualityClassifier, WikipediaFetcher};
use crate::metadata::{CollectError, FlatMetadata, MetadataCollector};
use crate::pipeline::chunker::Chunker;
use crate::pipeline::types::{LandmarkProcessor, Outcome, ProcessingResult};
use crate::vectorstore::{
    ArticleContext, EmbeddedChunk, SourceKind, SourceType, VectorStoreAdapter,
};

/// Composes catalog → article fetch → quality → chunk → embed → store, per article.
pub struct WikipediaProcessor {
    pub(crate) catalog: Arc<CatalogClient>,
    pub(crate) fetcher: WikipediaFetcher,
    pub(crate) classifier: Option<QualityClassifier>,
    pub(crate) chunker: Chunker,
    pub(crate) collector: MetadataCollector,
    pub(crate) embeddings: Box<dyn EmbeddingClient>,
    pub(crate) store: VectorStoreAdapter,
    pub(crate) chunk_size: usize,
    pub(crate) overlap: usize,
    pub(crate) replace_existing: bool,
}

impl WikipediaProcessor {
    /// Construct a processor wired to the configured external services.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = get_config();
        let catalog = Arc::new(CatalogClient::new()?);
        Ok(Self {
            collector: MetadataCollector::new(catalog.clone()),
            catalog,
            fetcher: WikipediaFetcher::new()?,
            classifier: QualityClassifier::from_config()?,
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
        let refs = self
            .catalog
            .get_wikipedia_refs(id)
            .await
            .map_err(|error| error.to_string())?;
        if refs.is_empty() {
            tracing::debug!(landmark_id = %id, "No Wikipedia references");
            return Ok(Outcome::NoContent);
        }

        let metadata = self.collector.collect(id).await.map_err(|error| match error {
            CollectError::NotFound(_) => "not_found".to_string(),
            other => other.to_string(),
        })?;

        let mut documents = 0usize;
        let mut chunks = 0usize;
        let mut errors = Vec::new();
        for article_ref in &refs {
            match self.process_article(id, article_ref, &metadata).await {
                Ok(stored) => {
                    documents += 1;
                    chunks += stored;
                }
                Err(error) => {
                    tracing::warn!(
                        landmark_id = %id,
                        article = %article_ref.title,
                        error = %error,
                        "Article failed; continuing with remaining articles"
                    );
                    errors.push(format!("{}: {error}", article_ref.title));
                }
            }
        }

        if documents == 0 && !errors.is_empty() {
            return Err(format!("all articles failed: {}", errors.join("; ")));
        }
        Ok(Outcome::Stored {
            chunks,
            documents,
            errors,
        })
    }

    /// Fetch, classify, chunk, embed, and store a single article. Returns the number
    /// of chunks stored; an article with no extractable text stores nothing.
    async fn process_article(
        &self,
        id: &LandmarkId,
        article_ref: &WikipediaArticleRef,
        landmark_metadata: &FlatMetadata,
    ) -> Result<usize, String> {
        let (text, revision_id) = self
            .fetcher
            .fetch(&article_ref.url)
            .await
            .map_err(|error| error.to_string())?;
        if text.is_empty() {
            tracing::debug!(landmark_id = %id, article = %article_ref.title, "Article has no body text");
            return Ok(0);
        }

        let quality = match &self.classifier {
            Some(classifier) => classifier.classify(&revision_id).await,
            None => None,
        };

        let chunks = self
            .chunker
            .chunk(&text, self.chunk_size, self.overlap)
            .map_err(|error| error.to_string())?;
        if chunks.is_empty() {
            return Ok(0);
        }

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

        let kind = SourceKind::Wikipedia(ArticleContext {
            title: article_ref.title.clone(),
            url: article_ref.url.clone(),
            revision_id,
            quality,
        });
        let ids = self
            .store
            .store_chunks(id, &kind, &embedded, landmark_metadata, self.replace_existing)
            .await
            .map_err(|error| error.to_string())?;
        Ok(ids.len())
    }
}

#[async_trait]
impl LandmarkProcessor for WikipediaProcessor {
    fn source_type(&self) -> SourceType {
        SourceType::Wikipedia
    }

    async fn process_landmark(&self, id: &LandmarkId) -> ProcessingResult {
        tracing::info!(
            operation = "landmark_process_start",
            module = "pipeline",
            landmark_id = %id,
            source_type = "wikipedia",
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
            source_type = "wikipedia",
            success = result.success,
            articles = result.articles_or_pages,
            chunks = result.chunks,
            "Landmark processed"
        );
        result
    }
}
