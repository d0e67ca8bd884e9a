//! Per-landmark metadata collection with a batch-lifetime cache.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;

use crate::catalog::{CatalogClient, CatalogError, LandmarkId};
use crate::metadata::{FlatMetadata, flatten_buildings, flatten_pluto};

/// Default cap on buildings flattened per landmark.
const DEFAULT_BUILDINGS_LIMIT: usize = 50;

/// Default cache lifetime. A landmark referenced by several Wikipedia articles within
/// a run resolves its metadata once.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const CACHE_CAPACITY: u64 = 20_000;

/// Errors raised while assembling landmark metadata.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Catalog interaction failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The landmark does not exist in the registry.
    #[error("Landmark {0} not found")]
    NotFound(LandmarkId),
}

/// Gathers core attributes, buildings, and PLUTO data for a landmark into a single
/// flat mapping, cached per landmark for the batch lifetime.
pub struct MetadataCollector {
    catalog: Arc<CatalogClient>,
    cache: Cache<String, FlatMetadata>,
    buildings_limit: usize,
}

impl MetadataCollector {
    /// Build a collector over the given catalog client.
    pub fn new(catalog: Arc<CatalogClient>) -> Self {
        Self::with_ttl(catalog, DEFAULT_CACHE_TTL)
    }

    /// Build a collector with an explicit cache TTL (used by tests).
    pub fn with_ttl(catalog: Arc<CatalogClient>, ttl: Duration) -> Self {
        Self {
            catalog,
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(CACHE_CAPACITY)
                .build(),
            buildings_limit: DEFAULT_BUILDINGS_LIMIT,
        }
    }

    /// Collect the flattened metadata for a landmark.
    pub async fn collect(&self, id: &LandmarkId) -> Result<FlatMetadata, CollectError> {
        if let Some(cached) = self.cache.get(id.as_str()).await {
            tracing::debug!(landmark_id = %id, "Metadata cache hit");
            return Ok(cached);
        }

        let landmark = self
            .catalog
            .get_landmark(id)
            .await?
            .ok_or_else(|| CollectError::NotFound(id.clone()))?;

        let mut metadata = FlatMetadata::new();
        metadata.insert("landmark_id", id.as_str());
        metadata.insert("name", landmark.name);
        metadata.insert_opt("borough", landmark.borough);
        metadata.insert_opt("neighborhood", landmark.neighborhood);
        metadata.insert_opt("object_type", landmark.object_type);
        metadata.insert_opt("architect", landmark.architect);
        metadata.insert_opt("style", landmark.style);
        metadata.insert_opt("designation_date", landmark.designation_date);
        metadata.insert("has_photo", landmark.has_photo);
        if let Some(lat) = landmark.lat {
            metadata.insert("lat", lat.to_string());
        }
        if let Some(lon) = landmark.lon {
            metadata.insert("lon", lon.to_string());
        }

        let buildings = self.catalog.get_buildings(id, self.buildings_limit).await?;
        metadata.extend(flatten_buildings(&buildings));

        if let Some(pluto) = self.catalog.get_pluto(id).await? {
            metadata.extend(flatten_pluto(&pluto));
        }

        tracing::debug!(
            landmark_id = %id,
            keys = metadata.len(),
            buildings = buildings.len(),
            "Collected landmark metadata"
        );
        self.cache.insert(id.as_str().to_string(), metadata.clone()).await;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataValue;
    use crate::retry::RetryPolicy;
    use httpmock::{Method::GET, MockServer};
    use reqwest::Client;
    use serde_json::json;

    fn test_catalog(server: &MockServer) -> Arc<CatalogClient> {
        Arc::new(CatalogClient {
            client: Client::builder()
                .user_agent("landmark-vectors-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            retry: RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                factor: 1.0,
                max_delay: Duration::from_millis(1),
                jitter: 0.0,
            },
        })
    }

    fn lp(id: &str) -> LandmarkId {
        LandmarkId::normalize(id).expect("valid id")
    }

    #[tokio::test]
    async fn collect_assembles_and_caches() {
        let server = MockServer::start_async().await;
        let detail = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/LpcReport/LP-00001");
                then.status(200).json_body(json!({
                    "lpNumber": "LP-00001",
                    "name": "Wyckoff House",
                    "borough": "Brooklyn",
                    "style": "Dutch Colonial",
                    "photoStatus": true
                }));
            })
            .await;
        let buildings = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/LpcReport/landmark/50/1");
                then.status(200).json_body(json!([
                    { "lpNumber": "LP-00001", "name": "Wyckoff House", "bbl": "3085770001" }
                ]));
            })
            .await;
        let pluto = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/Pluto/LP-00001");
                then.status(200).json_body(json!({ "yearBuilt": "1652" }));
            })
            .await;

        let collector = MetadataCollector::new(test_catalog(&server));
        let metadata = collector.collect(&lp("LP-00001")).await.expect("metadata");

        assert_eq!(
            metadata.get("landmark_id").and_then(MetadataValue::as_text),
            Some("LP-00001")
        );
        assert_eq!(
            metadata.get("borough").and_then(MetadataValue::as_text),
            Some("Brooklyn")
        );
        assert_eq!(metadata.get("has_photo"), Some(&MetadataValue::Bool(true)));
        assert_eq!(
            metadata.get("building_0_bbl").and_then(MetadataValue::as_text),
            Some("3085770001")
        );
        assert_eq!(
            metadata.get("pluto_year_built").and_then(MetadataValue::as_text),
            Some("1652")
        );

        // Second call is served from cache; upstream hit counts stay at one.
        let again = collector.collect(&lp("LP-00001")).await.expect("metadata");
        assert_eq!(again, metadata);
        detail.assert_hits(1);
        buildings.assert_hits(1);
        pluto.assert_hits(1);
    }

    #[tokio::test]
    async fn missing_landmark_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/LpcReport/LP-99999");
                then.status(404);
            })
            .await;

        let collector = MetadataCollector::new(test_catalog(&server));
        let error = collector
            .collect(&lp("LP-99999"))
            .await
            .expect_err("not found");
        assert!(matches!(error, CollectError::NotFound(_)));
    }
}
