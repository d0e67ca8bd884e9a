//! HTTP client wrapper for the landmark catalog provider.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::catalog::types::{
    Building, CatalogError, Landmark, LandmarkId, LpcReportDto, LpcReportPage, PlutoRecord,
    WebContentDto, WikipediaArticleRef,
};
use crate::config::get_config;
use crate::retry::{RetryPolicy, with_retry};

/// Page size used when the provider omits a total and the count must be probed.
const PROBE_PAGE_SIZE: usize = 100;

/// Read-through client over the landmark registry REST API.
pub struct CatalogClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) retry: RetryPolicy,
}

impl CatalogClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, CatalogError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("landmark-vectors/0.3")
            .timeout(config.catalog_timeout)
            .pool_max_idle_per_host(20)
            .build()?;

        Ok(Self {
            client,
            base_url: config.catalog_api_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// List a page of landmarks, returning the normalized results and the provider total
    /// when one is reported.
    ///
    /// Deterministic for a given `(page_size, page)` pair within a run. Entries whose
    /// identifier does not normalize are skipped with a WARN log.
    pub async fn list_landmarks(
        &self,
        page_size: usize,
        page: usize,
    ) -> Result<(Vec<Landmark>, Option<u64>), CatalogError> {
        let path = format!("api/LpcReport/{page_size}/{page}");
        let Some(body) = self.fetch_optional::<LpcReportPage>("catalog_list", &path).await? else {
            return Ok((Vec::new(), None));
        };

        let mut landmarks = Vec::with_capacity(body.results.len());
        for dto in body.results {
            let raw_id = dto.lp_number.clone();
            match dto.into_landmark() {
                Ok(landmark) => landmarks.push(landmark),
                Err(error) => {
                    tracing::warn!(lp_number = %raw_id, error = %error, "Skipping malformed landmark entry");
                }
            }
        }
        Ok((landmarks, body.total))
    }

    /// Total number of landmarks known to the provider.
    ///
    /// Uses the reported total when present; otherwise probes sequential pages until an
    /// incomplete page is observed and sums the lengths.
    pub async fn total_count(&self) -> Result<u64, CatalogError> {
        let (_, total) = self.list_landmarks(1, 1).await?;
        if let Some(total) = total {
            return Ok(total);
        }

        tracing::debug!("Provider omitted total; probing page lengths");
        let mut count: u64 = 0;
        let mut page = 1usize;
        loop {
            let (results, _) = self.list_landmarks(PROBE_PAGE_SIZE, page).await?;
            count += results.len() as u64;
            if results.len() < PROBE_PAGE_SIZE {
                return Ok(count);
            }
            page += 1;
        }
    }

    /// Fetch a single landmark's detail record. A 404 yields `None`.
    pub async fn get_landmark(&self, id: &LandmarkId) -> Result<Option<Landmark>, CatalogError> {
        let path = format!("api/LpcReport/{id}");
        let Some(dto) = self.fetch_optional::<LpcReportDto>("catalog_detail", &path).await? else {
            return Ok(None);
        };
        dto.into_landmark().map(Some)
    }

    /// Fetch buildings for a landmark, truncated to `limit`.
    ///
    /// The dedicated buildings endpoint is the primary source; when it yields nothing the
    /// `landmarks[]` array embedded in the detail response is used instead. Malformed
    /// entries are skipped with a WARN log, and entries carrying an identifier are matched
    /// case-insensitively against the requested landmark.
    pub async fn get_buildings(
        &self,
        id: &LandmarkId,
        limit: usize,
    ) -> Result<Vec<Building>, CatalogError> {
        let path = format!("api/LpcReport/landmark/{limit}/1?LpcNumber={id}");
        let primary = self
            .fetch_optional::<serde_json::Value>("catalog_buildings", &path)
            .await?
            .map(|value| collect_buildings(value, id, limit))
            .unwrap_or_default();
        if !primary.is_empty() {
            return Ok(primary);
        }

        let detail_path = format!("api/LpcReport/{id}");
        let fallback = self
            .fetch_optional::<LpcReportDto>("catalog_detail", &detail_path)
            .await?
            .and_then(|dto| dto.landmarks)
            .map(|entries| {
                collect_buildings(serde_json::Value::Array(entries), id, limit)
            })
            .unwrap_or_default();
        Ok(fallback)
    }

    /// Fetch the PLUTO record for a landmark, when one exists.
    pub async fn get_pluto(&self, id: &LandmarkId) -> Result<Option<PlutoRecord>, CatalogError> {
        let path = format!("api/Pluto/{id}");
        let Some(value) = self
            .fetch_optional::<serde_json::Value>("catalog_pluto", &path)
            .await?
        else {
            return Ok(None);
        };

        // Some deployments return the record bare, others as a one-element array.
        let record = match value {
            serde_json::Value::Array(mut entries) => {
                if entries.is_empty() {
                    return Ok(None);
                }
                entries.remove(0)
            }
            other => other,
        };
        match serde_json::from_value::<PlutoRecord>(record) {
            Ok(record) => Ok(Some(record)),
            Err(error) => {
                tracing::warn!(landmark_id = %id, error = %error, "Skipping malformed PLUTO record");
                Ok(None)
            }
        }
    }

    /// Fetch Wikipedia article references for a landmark.
    ///
    /// Filters web content to entries whose `record_type` equals `wikipedia`
    /// (case-insensitive) and that carry both a URL and a title.
    pub async fn get_wikipedia_refs(
        &self,
        id: &LandmarkId,
    ) -> Result<Vec<WikipediaArticleRef>, CatalogError> {
        let path = format!("api/WebContent/{id}");
        let Some(items) = self
            .fetch_optional::<Vec<WebContentDto>>("catalog_web_content", &path)
            .await?
        else {
            return Ok(Vec::new());
        };

        let refs = items
            .into_iter()
            .filter(|item| {
                item.record_type
                    .as_deref()
                    .is_some_and(|kind| kind.eq_ignore_ascii_case("wikipedia"))
            })
            .filter(|item| {
                item.lp_number
                    .as_deref()
                    .map(|lp| id.matches(lp))
                    .unwrap_or(true)
            })
            .filter_map(|item| match (item.url, item.title) {
                (Some(url), Some(title)) => Some(WikipediaArticleRef {
                    landmark_id: id.clone(),
                    url,
                    title,
                }),
                _ => {
                    tracing::warn!(landmark_id = %id, "Skipping Wikipedia reference without url/title");
                    None
                }
            })
            .collect();
        Ok(refs)
    }

    /// Perform a GET under the standard retry policy. A 404 yields `Ok(None)`; any other
    /// non-success status is surfaced (and retried when transient).
    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
    ) -> Result<Option<T>, CatalogError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        with_retry(operation, self.retry, || {
            let url = url.clone();
            async move {
                let response = self.client.get(&url).send().await?;
                match response.status() {
                    StatusCode::NOT_FOUND => Ok(None),
                    status if status.is_success() => Ok(Some(response.json::<T>().await?)),
                    status => {
                        let body = response.text().await.unwrap_or_default();
                        Err(CatalogError::UnexpectedStatus { status, body })
                    }
                }
            }
        })
        .await
    }
}

/// Extract building records from a provider payload that may be a bare array or an
/// object wrapping a `results` array.
fn collect_buildings(value: serde_json::Value, id: &LandmarkId, limit: usize) -> Vec<Building> {
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(mut map) => match map.remove("results") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut buildings = Vec::new();
    for entry in entries {
        match serde_json::from_value::<Building>(entry) {
            Ok(building) => {
                let correlated = building
                    .lp_number
                    .as_deref()
                    .map(|lp| id.matches(lp))
                    .unwrap_or(true);
                if correlated {
                    buildings.push(building);
                }
            }
            Err(error) => {
                tracing::warn!(landmark_id = %id, error = %error, "Skipping malformed building entry");
            }
        }
        if buildings.len() == limit {
            break;
        }
    }
    buildings
}
