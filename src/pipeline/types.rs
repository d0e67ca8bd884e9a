//! Outcome and reporting types for the ingestion pipeline.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::catalog::LandmarkId;
use crate::vectorstore::SourceType;

/// First-class result of one landmark/source pass. Having no source content is a
/// success, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Chunks were embedded and stored.
    Stored {
        /// Number of chunks written.
        chunks: usize,
        /// Number of source documents (PDF pages count as one; articles individually).
        documents: usize,
        /// Per-document errors that did not fail the landmark.
        errors: Vec<String>,
    },
    /// The landmark has no content for this source.
    NoContent,
    /// The pass failed before any chunk was stored.
    Failed {
        /// Short reason recorded in batch reports (`"timeout"`, `"not_found"`, ...).
        reason: String,
    },
}

/// Per-landmark result summary aggregated by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    /// Landmark the result describes.
    #[serde(serialize_with = "serialize_landmark_id")]
    pub landmark_id: LandmarkId,
    /// Whether the pass counts as successful.
    pub success: bool,
    /// Articles (Wikipedia) or documents (PDF) processed.
    pub articles_or_pages: usize,
    /// Chunks embedded and stored.
    pub chunks: usize,
    /// Errors accumulated along the way; non-empty errors can coexist with success.
    pub errors: Vec<String>,
}

fn serialize_landmark_id<S: serde::Serializer>(
    id: &LandmarkId,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(id.as_str())
}

impl ProcessingResult {
    /// Build a result from a pass outcome.
    pub fn from_outcome(landmark_id: LandmarkId, outcome: Outcome) -> Self {
        match outcome {
            Outcome::Stored {
                chunks,
                documents,
                errors,
            } => Self {
                landmark_id,
                success: true,
                articles_or_pages: documents,
                chunks,
                errors,
            },
            Outcome::NoContent => Self {
                landmark_id,
                success: true,
                articles_or_pages: 0,
                chunks: 0,
                errors: Vec::new(),
            },
            Outcome::Failed { reason } => Self {
                landmark_id,
                success: false,
                articles_or_pages: 0,
                chunks: 0,
                errors: vec![reason],
            },
        }
    }

    /// Shorthand for a failed pass.
    pub fn failed(landmark_id: LandmarkId, reason: impl Into<String>) -> Self {
        Self::from_outcome(
            landmark_id,
            Outcome::Failed {
                reason: reason.into(),
            },
        )
    }
}

/// Batch totals accumulated in completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStatistics {
    /// Landmarks a worker finished (successfully or not).
    pub attempted: usize,
    /// Successful landmarks, including zero-content successes.
    pub succeeded: usize,
    /// Failed landmarks.
    pub failed: usize,
    /// Total chunks embedded and stored.
    pub chunks: usize,
    /// Wall-clock duration of the run in seconds.
    pub duration_secs: f64,
}

impl BatchStatistics {
    /// Fold one result into the totals.
    pub fn record(&mut self, result: &ProcessingResult) {
        self.attempted += 1;
        if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.chunks += result.chunks;
    }

    /// Set the run duration.
    pub fn finish(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }
}

/// Everything a batch run produces: totals plus the per-landmark results in
/// completion order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRunReport {
    /// Aggregated totals.
    pub statistics: BatchStatistics,
    /// Individual results, in the order workers completed them.
    pub results: Vec<ProcessingResult>,
}

/// Interface implemented by per-source processors.
///
/// Processors are owned by a single worker for its lifetime; they are safe to reuse
/// across that worker's items but are never shared between workers.
#[async_trait]
pub trait LandmarkProcessor: Send {
    /// Source this processor ingests.
    fn source_type(&self) -> SourceType;

    /// Process one landmark end to end, never panicking: all failures are folded
    /// into the returned result.
    async fn process_landmark(&self, id: &LandmarkId) -> ProcessingResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lp(id: &str) -> LandmarkId {
        LandmarkId::normalize(id).expect("valid id")
    }

    #[test]
    fn no_content_is_a_success() {
        let result = ProcessingResult::from_outcome(lp("LP-01844"), Outcome::NoContent);
        assert!(result.success);
        assert_eq!(result.articles_or_pages, 0);
        assert_eq!(result.chunks, 0);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn partial_failures_stay_successful() {
        let result = ProcessingResult::from_outcome(
            lp("LP-00001"),
            Outcome::Stored {
                chunks: 5,
                documents: 2,
                errors: vec!["Second Article: fetch failed".into()],
            },
        );
        assert!(result.success);
        assert_eq!(result.chunks, 5);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn statistics_accumulate_in_any_order() {
        let mut stats = BatchStatistics::default();
        stats.record(&ProcessingResult::from_outcome(
            lp("LP-00001"),
            Outcome::Stored {
                chunks: 3,
                documents: 1,
                errors: vec![],
            },
        ));
        stats.record(&ProcessingResult::failed(lp("LP-00002"), "timeout"));
        stats.record(&ProcessingResult::from_outcome(lp("LP-00003"), Outcome::NoContent));

        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.chunks, 3);
    }
}
