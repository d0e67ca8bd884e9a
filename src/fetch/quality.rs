//! Article-quality classification.
//!
//! Wikipedia article quality is optional attribution metadata: the classifier is
//! called once per article revision and any failure degrades to `None` rather than
//! failing the landmark.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::get_config;
use crate::fetch::FetchError;

/// Deadline for a single prediction call. Quality is best-effort metadata, so the
/// budget is deliberately short.
const PREDICT_TIMEOUT: Duration = Duration::from_secs(10);

/// Assessment-scale classes returned by the quality model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum QualityClass {
    /// Featured article.
    FA,
    /// Good article.
    GA,
    /// B-class.
    B,
    /// C-class.
    C,
    /// Start-class.
    Start,
    /// Stub.
    Stub,
}

impl QualityClass {
    /// Human-readable description of the class.
    pub fn description(self) -> &'static str {
        match self {
            Self::FA => "Featured article",
            Self::GA => "Good article",
            Self::B => "B-class article",
            Self::C => "C-class article",
            Self::Start => "Start-class article",
            Self::Stub => "Stub-class article",
        }
    }
}

impl fmt::Display for QualityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FA => "FA",
            Self::GA => "GA",
            Self::B => "B",
            Self::C => "C",
            Self::Start => "Start",
            Self::Stub => "Stub",
        };
        f.write_str(label)
    }
}

/// Quality prediction for one article revision.
#[derive(Debug, Clone)]
pub struct Quality {
    /// Predicted class.
    pub prediction: QualityClass,
    /// Model confidence for the predicted class, in `[0, 1]`.
    pub score: f64,
    /// Human-readable description of the predicted class.
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    prediction: QualityClass,
    #[serde(default)]
    probability: BTreeMap<String, f64>,
}

/// Client for the external article-quality prediction API.
pub struct QualityClassifier {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl QualityClassifier {
    /// Construct a classifier when a quality endpoint is configured.
    pub fn from_config() -> Result<Option<Self>, FetchError> {
        let config = get_config();
        let Some(base_url) = config.quality_api_url.clone() else {
            return Ok(None);
        };
        let client = Client::builder()
            .user_agent("landmark-vectors/0.3")
            .timeout(PREDICT_TIMEOUT)
            .build()?;
        Ok(Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }))
    }

    /// Classify a revision. Single-shot: failures log a WARN and yield `None`.
    pub async fn classify(&self, revision_id: &str) -> Option<Quality> {
        if revision_id.is_empty() {
            return None;
        }

        let url = format!("{}/predict", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "revision_id": revision_id }))
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(
                    revision_id,
                    status = %response.status(),
                    "Quality prediction rejected"
                );
                return None;
            }
            Err(error) => {
                tracing::warn!(revision_id, error = %error, "Quality prediction unavailable");
                return None;
            }
        };

        match response.json::<PredictionResponse>().await {
            Ok(body) => {
                let score = body
                    .probability
                    .get(&body.prediction.to_string())
                    .copied()
                    .unwrap_or(0.0);
                Some(Quality {
                    prediction: body.prediction,
                    score,
                    description: body.prediction.description().to_string(),
                })
            }
            Err(error) => {
                tracing::warn!(revision_id, error = %error, "Malformed quality prediction");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn test_classifier(server: &MockServer) -> QualityClassifier {
        QualityClassifier {
            client: Client::builder()
                .user_agent("landmark-vectors-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
        }
    }

    #[tokio::test]
    async fn classify_returns_prediction_with_confidence() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/predict")
                    .json_body(json!({ "revision_id": "1234567" }));
                then.status(200).json_body(json!({
                    "prediction": "GA",
                    "probability": {
                        "FA": 0.05, "GA": 0.72, "B": 0.12,
                        "C": 0.07, "Start": 0.03, "Stub": 0.01
                    }
                }));
            })
            .await;

        let quality = test_classifier(&server)
            .classify("1234567")
            .await
            .expect("prediction");
        assert_eq!(quality.prediction, QualityClass::GA);
        assert!((quality.score - 0.72).abs() < f64::EPSILON);
        assert_eq!(quality.description, "Good article");
    }

    #[tokio::test]
    async fn failures_degrade_to_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/predict");
                then.status(500);
            })
            .await;

        assert!(test_classifier(&server).classify("1234567").await.is_none());
    }

    #[tokio::test]
    async fn empty_revision_skips_the_call() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/predict");
                then.status(200).json_body(json!({ "prediction": "Stub" }));
            })
            .await;

        assert!(test_classifier(&server).classify("").await.is_none());
        mock.assert_hits(0);
    }
}
