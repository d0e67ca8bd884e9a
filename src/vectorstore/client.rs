//! HTTP client wrapper for the vector index.
//!
//! Methods here perform a single wire call each; retry orchestration lives in the
//! adapter so upserts, deletes, and queries can apply their own policies.

use reqwest::{Client, Method};
use serde_json::{Map, Value, json};

use crate::config::get_config;
use crate::vectorstore::types::{
    FetchResponse, IndexStats, QueryResponse, UpsertResponse, VectorMatch, VectorRecord,
    VectorStoreError,
};

/// Lightweight HTTP client speaking the index REST protocol: `upsert`, `query`,
/// `delete`, `fetch`, and `describe_index_stats` over a named index with an optional
/// namespace.
pub struct IndexClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) namespace: Option<String>,
}

impl IndexClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, VectorStoreError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("landmark-vectors/0.3")
            .timeout(config.vector_store_timeout)
            .pool_max_idle_per_host(20)
            .build()?;

        tracing::debug!(
            url = %config.vector_index_url,
            index = %config.vector_index_name,
            namespace = ?config.vector_namespace,
            "Initialized vector index HTTP client"
        );

        Ok(Self {
            client,
            base_url: config.vector_index_url.trim_end_matches('/').to_string(),
            api_key: config.vector_api_key.clone(),
            namespace: config.vector_namespace.clone(),
        })
    }

    /// Upsert a batch of prepared records, returning the acknowledged count.
    pub async fn upsert(&self, records: &[VectorRecord]) -> Result<usize, VectorStoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let vectors: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "id": record.id,
                    "values": record.values,
                    "metadata": Value::Object(record.metadata.to_json()),
                })
            })
            .collect();
        let mut body = Map::new();
        body.insert("vectors".into(), Value::Array(vectors));
        self.apply_namespace(&mut body);

        let response: UpsertResponse = self.post_json("vectors/upsert", Value::Object(body)).await?;
        Ok(if response.upserted_count > 0 {
            response.upserted_count
        } else {
            records.len()
        })
    }

    /// Similarity query (with a vector) or metadata-only listing (without one).
    pub async fn query(
        &self,
        vector: Option<&[f32]>,
        top_k: usize,
        filter: Option<&Value>,
        include_values: bool,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let mut body = Map::new();
        if let Some(vector) = vector {
            body.insert("vector".into(), json!(vector));
        }
        body.insert("topK".into(), json!(top_k));
        body.insert("includeMetadata".into(), json!(true));
        body.insert("includeValues".into(), json!(include_values));
        if let Some(filter) = filter {
            body.insert("filter".into(), filter.clone());
        }
        self.apply_namespace(&mut body);

        let response: QueryResponse = self.post_json("query", Value::Object(body)).await?;
        Ok(response
            .matches
            .into_iter()
            .map(|wire| wire.into_match())
            .collect())
    }

    /// Delete every vector matching `filter`. Deleting a filter that matches nothing
    /// is acknowledged like any other delete.
    pub async fn delete_by_filter(&self, filter: &Value) -> Result<(), VectorStoreError> {
        let mut body = Map::new();
        body.insert("filter".into(), filter.clone());
        self.apply_namespace(&mut body);

        let _: Value = self.post_json("vectors/delete", Value::Object(body)).await?;
        Ok(())
    }

    /// Fetch vectors by ID. Missing IDs are simply absent from the result.
    pub async fn fetch(&self, ids: &[String]) -> Result<Vec<VectorMatch>, VectorStoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/vectors/fetch", self.base_url);
        let mut query: Vec<(&str, String)> = ids.iter().map(|id| ("ids", id.clone())).collect();
        if let Some(namespace) = &self.namespace {
            query.push(("namespace", namespace.clone()));
        }

        let request = self.authorized(self.client.request(Method::GET, &url).query(&query));
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::UnexpectedStatus { status, body });
        }
        let payload: FetchResponse = response.json().await?;

        let matches = payload
            .vectors
            .into_iter()
            .filter_map(|(id, value)| {
                let object = value.as_object()?;
                Some(VectorMatch {
                    id,
                    score: 0.0,
                    metadata: object
                        .get("metadata")
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default(),
                    values: object
                        .get("values")
                        .and_then(|values| serde_json::from_value(values.clone()).ok()),
                })
            })
            .collect();
        Ok(matches)
    }

    /// Aggregate statistics for the index.
    pub async fn describe_index_stats(&self) -> Result<IndexStats, VectorStoreError> {
        let mut body = Map::new();
        self.apply_namespace(&mut body);
        self.post_json("describe_index_stats", Value::Object(body)).await
    }

    /// Insert the namespace field exactly as configured. Unset omits the field;
    /// an explicitly empty namespace is sent verbatim.
    fn apply_namespace(&self, body: &mut Map<String, Value>) {
        if let Some(namespace) = &self.namespace {
            body.insert("namespace".into(), Value::String(namespace.clone()));
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request.header("Api-Key", api_key)
        } else {
            request
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, VectorStoreError> {
        let url = format!("{}/{}", self.base_url, path);
        let request = self.authorized(self.client.post(&url)).json(&body);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(url = %url, error = %error, "Index request failed");
            return Err(error);
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FlatMetadata;
    use httpmock::{Method::POST, MockServer};

    pub(crate) fn test_client(server: &MockServer, namespace: Option<&str>) -> IndexClient {
        IndexClient {
            client: Client::builder()
                .user_agent("landmark-vectors-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
            namespace: namespace.map(str::to_string),
        }
    }

    fn record(id: &str) -> VectorRecord {
        let mut metadata = FlatMetadata::new();
        metadata.insert("text", "body");
        VectorRecord {
            id: id.into(),
            values: vec![0.1, 0.2],
            metadata,
        }
    }

    #[tokio::test]
    async fn upsert_sends_vectors_and_namespace() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectors/upsert")
                    .json_body_partial(r#"{ "namespace": "landmarks" }"#);
                then.status(200)
                    .json_body(serde_json::json!({ "upsertedCount": 1 }));
            })
            .await;

        let client = test_client(&server, Some("landmarks"));
        let count = client
            .upsert(&[record("LP-00009-chunk-0")])
            .await
            .expect("count");
        assert_eq!(count, 1);
        mock.assert();
    }

    #[tokio::test]
    async fn empty_namespace_is_sent_verbatim() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/vectors/upsert")
                    .json_body_partial(r#"{ "namespace": "" }"#);
                then.status(200)
                    .json_body(serde_json::json!({ "upsertedCount": 1 }));
            })
            .await;

        let client = test_client(&server, Some(""));
        client
            .upsert(&[record("LP-00009-chunk-0")])
            .await
            .expect("count");
        mock.assert();
    }

    #[tokio::test]
    async fn unset_namespace_omits_the_field() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                // Exact body match: no namespace key may be present.
                when.method(POST).path("/vectors/delete").json_body(
                    serde_json::json!({ "filter": { "landmark_id": { "$eq": "LP-00009" } } }),
                );
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let client = test_client(&server, None);
        client
            .delete_by_filter(&serde_json::json!({ "landmark_id": { "$eq": "LP-00009" } }))
            .await
            .expect("delete");
        mock.assert();
    }

    #[tokio::test]
    async fn query_without_vector_lists_metadata() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/query");
                then.status(200).json_body(serde_json::json!({
                    "matches": [
                        {
                            "id": "LP-00009-chunk-0",
                            "metadata": { "landmark_id": "LP-00009", "source_type": "pdf" }
                        }
                    ]
                }));
            })
            .await;

        let client = test_client(&server, None);
        let matches = client.query(None, 100, None, false).await.expect("matches");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "LP-00009-chunk-0");
        assert_eq!(matches[0].score, 0.0);
        assert_eq!(
            matches[0].metadata["landmark_id"],
            serde_json::json!("LP-00009")
        );
    }
}
