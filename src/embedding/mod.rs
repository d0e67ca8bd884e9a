//! Embedding client abstraction and HTTP provider adapter.
//!
//! The provider contract is `{model, input: [string]}` → `{embeddings: [[f32; N]]}`.
//! Inputs are batched up to a configured size, transient failures are retried under
//! the standard policy, and every returned vector is checked for the configured
//! dimension and finite components before it reaches the store.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::get_config;
use crate::correlation::current_correlation_id;
use crate::retry::{Retryable, RetryPolicy, with_retry};

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected embedding response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A single input was rejected even after batch splitting.
    #[error("Embedding input {index} rejected by the provider")]
    InputRejected {
        /// Index of the offending input in the original call.
        index: usize,
    },
    /// Returned vector does not match the configured dimension.
    #[error("Embedding {index} has dimension {actual}, expected {expected}")]
    Dimension {
        /// Index of the offending input in the original call.
        index: usize,
        /// Configured dimension.
        expected: usize,
        /// Observed dimension.
        actual: usize,
    },
    /// Returned vector contains NaN or infinite components.
    #[error("Embedding {index} contains non-finite components")]
    NotFinite {
        /// Index of the offending input in the original call.
        index: usize,
    },
    /// Provider returned a different number of vectors than inputs.
    #[error("Provider returned {actual} embeddings for {expected} inputs")]
    CountMismatch {
        /// Inputs sent.
        expected: usize,
        /// Vectors received.
        actual: usize,
    },
}

impl Retryable for EmbeddingError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one vector per supplied text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Convenience wrapper embedding a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed(&texts).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP adapter for the external embedding provider.
pub struct HttpEmbeddingClient {
    pub(crate) client: Client,
    pub(crate) endpoint: String,
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
    pub(crate) dimension: usize,
    pub(crate) batch_size: usize,
    pub(crate) retry: RetryPolicy,
}

impl HttpEmbeddingClient {
    /// Construct a client using configuration derived from the environment.
    pub fn new() -> Result<Self, EmbeddingError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("landmark-vectors/0.3")
            .timeout(config.embedding_timeout)
            .pool_max_idle_per_host(20)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.embedding_api_url.clone(),
            api_key: config.embedding_api_key.clone(),
            model: config.embedding_model_id.clone(),
            dimension: config.embedding_dimension,
            batch_size: config.embedding_batch_size,
            retry: RetryPolicy::default(),
        })
    }

    /// Issue one provider call for a batch of inputs.
    async fn call_provider(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        with_retry("embedding_request", self.retry, || {
            let body = body.clone();
            async move {
                let mut request = self.client.post(&self.endpoint).json(&body);
                if let Some(key) = &self.api_key {
                    request = request.bearer_auth(key);
                }
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(EmbeddingError::UnexpectedStatus { status, body });
                }
                let payload: EmbeddingsResponse = response.json().await?;
                Ok(payload.embeddings)
            }
        })
        .await
    }

    /// Embed one batch, splitting into halves once when the provider rejects the
    /// request as too large. A single input that still fails becomes
    /// [`EmbeddingError::InputRejected`] carrying its original index.
    async fn embed_batch(
        &self,
        inputs: &[String],
        offset: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        match self.call_provider(inputs).await {
            Ok(vectors) => {
                if vectors.len() != inputs.len() {
                    return Err(EmbeddingError::CountMismatch {
                        expected: inputs.len(),
                        actual: vectors.len(),
                    });
                }
                Ok(vectors)
            }
            Err(error) if is_oversize_rejection(&error) && inputs.len() > 1 => {
                let mid = inputs.len() / 2;
                tracing::warn!(
                    inputs = inputs.len(),
                    offset,
                    "Provider rejected batch as too large; splitting"
                );
                let mut vectors = Box::pin(self.embed_batch(&inputs[..mid], offset)).await?;
                let rest = Box::pin(self.embed_batch(&inputs[mid..], offset + mid)).await?;
                vectors.extend(rest);
                Ok(vectors)
            }
            Err(error) if is_oversize_rejection(&error) => {
                Err(EmbeddingError::InputRejected { index: offset })
            }
            Err(error) => Err(error),
        }
    }

    fn validate(&self, vectors: &[Vec<f32>]) -> Result<(), EmbeddingError> {
        for (index, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(EmbeddingError::Dimension {
                    index,
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|component| !component.is_finite()) {
                return Err(EmbeddingError::NotFinite { index });
            }
        }
        Ok(())
    }
}

fn is_oversize_rejection(error: &EmbeddingError) -> bool {
    matches!(
        error,
        EmbeddingError::UnexpectedStatus { status, .. }
            if *status == StatusCode::PAYLOAD_TOO_LARGE || *status == StatusCode::BAD_REQUEST
    )
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match current_correlation_id() {
            Some(correlation_id) => tracing::info!(
                operation = "embedding_generation",
                correlation_id = %correlation_id,
                module = "embedding",
                inputs = texts.len(),
                model = %self.model,
                "Generating embeddings"
            ),
            None => tracing::info!(
                operation = "embedding_generation",
                module = "embedding",
                inputs = texts.len(),
                model = %self.model,
                "Generating embeddings"
            ),
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            let offset = batch_index * self.batch_size;
            let batch_vectors = self.embed_batch(batch, offset).await?;
            vectors.extend(batch_vectors);
        }

        self.validate(&vectors)?;
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use std::time::Duration;

    fn test_client(server: &MockServer, dimension: usize, batch_size: usize) -> HttpEmbeddingClient {
        HttpEmbeddingClient {
            client: Client::builder()
                .user_agent("landmark-vectors-test")
                .build()
                .expect("client"),
            endpoint: server.url("/embeddings"),
            api_key: None,
            model: "test-embed".into(),
            dimension,
            batch_size,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                factor: 1.0,
                max_delay: Duration::from_millis(2),
                jitter: 0.0,
            },
        }
    }

    #[tokio::test]
    async fn embed_returns_vectors_in_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(serde_json::json!({
                    "embeddings": [[0.1, 0.2], [0.3, 0.4]]
                }));
            })
            .await;

        let client = test_client(&server, 2, 16);
        let vectors = client
            .embed(&["first".into(), "second".into()])
            .await
            .expect("vectors");
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn transient_503s_are_retried_until_success() {
        use std::sync::atomic::{AtomicU32, Ordering};

        static CALLS: AtomicU32 = AtomicU32::new(0);
        CALLS.store(0, Ordering::SeqCst);

        fn is_failing_call(_req: &httpmock::prelude::HttpMockRequest) -> bool {
            CALLS.fetch_add(1, Ordering::SeqCst) < 2
        }
        fn is_success_call(_req: &httpmock::prelude::HttpMockRequest) -> bool {
            CALLS.load(Ordering::SeqCst) >= 2
        }

        let server = MockServer::start_async().await;

        // First two requests are claimed by the failing mock, the third falls
        // through to the success mock: one logical call, two retries.
        let failures = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .matches(is_failing_call);
                then.status(503);
            })
            .await;
        let success = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .matches(is_success_call);
                then.status(200)
                    .json_body(serde_json::json!({ "embeddings": [[0.5, 0.5]] }));
            })
            .await;

        let client = test_client(&server, 2, 16);
        let vectors = client.embed(&["text".into()]).await.expect("vectors");
        assert_eq!(vectors, vec![vec![0.5, 0.5]]);
        failures.assert_hits(2);
        success.assert_hits(1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200)
                    .json_body(serde_json::json!({ "embeddings": [[0.1, 0.2, 0.3]] }));
            })
            .await;

        let client = test_client(&server, 2, 16);
        let error = client.embed(&["text".into()]).await.expect_err("mismatch");
        assert!(matches!(
            error,
            EmbeddingError::Dimension {
                index: 0,
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn oversize_single_input_carries_its_index() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(413);
            })
            .await;

        let client = test_client(&server, 2, 2);
        let error = client
            .embed(&["a".into(), "b".into(), "c".into()])
            .await
            .expect_err("rejected");
        assert!(matches!(error, EmbeddingError::InputRejected { index: 0 }));
    }

    #[tokio::test]
    async fn inputs_are_batched() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200)
                    .json_body(serde_json::json!({ "embeddings": [[0.0, 1.0]] }));
            })
            .await;

        let client = test_client(&server, 2, 1);
        let vectors = client
            .embed(&["a".into(), "b".into(), "c".into()])
            .await
            .expect("vectors");
        assert_eq!(vectors.len(), 3);
        mock.assert_hits(3);
    }
}
