//! Record construction and validation ahead of upsert.

use time::OffsetDateTime;

use crate::catalog::LandmarkId;
use crate::metadata::FlatMetadata;
use crate::vectorstore::ids::{id_is_well_formed, make_vector_id};
use crate::vectorstore::types::{EmbeddedChunk, SourceKind, VectorRecord, VectorStoreError};

/// Current timestamp formatted for the `processing_date` metadata key.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Build the upsert-ready records for one `store_chunks` call.
///
/// Metadata precedence, lowest to highest: chunk-scoped metadata, landmark metadata,
/// then the standard keys (`landmark_id`, `source_type`, `chunk_index`, `total_chunks`,
/// `processing_date`, `text`) and Wikipedia attribution (`article_*`).
pub(crate) fn build_records(
    landmark_id: &LandmarkId,
    kind: &SourceKind,
    chunks: &[EmbeddedChunk],
    landmark_metadata: &FlatMetadata,
    processing_date: &str,
) -> Vec<VectorRecord> {
    chunks
        .iter()
        .map(|chunk| {
            let mut metadata = chunk.metadata.clone();
            metadata.extend(landmark_metadata.clone());

            metadata.insert("landmark_id", landmark_id.as_str());
            metadata.insert("source_type", kind.source_type().as_str());
            metadata.insert("chunk_index", chunk.index);
            metadata.insert("total_chunks", chunk.total);
            metadata.insert("token_count", chunk.token_count);
            metadata.insert("processing_date", processing_date);
            metadata.insert("text", chunk.text.as_str());

            if let Some(article) = kind.article() {
                metadata.insert("article_title", article.title.as_str());
                metadata.insert("article_url", article.url.as_str());
                metadata.insert("article_revision_id", article.revision_id.as_str());
                if let Some(quality) = &article.quality {
                    metadata.insert("article_quality", quality.prediction.to_string());
                    metadata.insert("article_quality_score", quality.score);
                    metadata.insert("article_quality_description", quality.description.as_str());
                }
            }

            VectorRecord {
                id: make_vector_id(kind, landmark_id, chunk.index),
                values: chunk.embedding.clone(),
                metadata,
            }
        })
        .collect()
}

/// Check the invariants every record must satisfy before it may be committed.
pub(crate) fn validate_record(
    record: &VectorRecord,
    dimension: usize,
) -> Result<(), VectorStoreError> {
    if !id_is_well_formed(&record.id) {
        return Err(VectorStoreError::InvalidRecord(format!(
            "id '{}' does not match the expected pattern",
            record.id
        )));
    }
    if record.values.len() != dimension {
        return Err(VectorStoreError::InvalidRecord(format!(
            "id '{}' has {} values, expected {dimension}",
            record.id,
            record.values.len()
        )));
    }
    if record.values.iter().any(|value| !value.is_finite()) {
        return Err(VectorStoreError::InvalidRecord(format!(
            "id '{}' carries non-finite values",
            record.id
        )));
    }
    let text_present = record
        .metadata
        .get("text")
        .and_then(|value| value.as_text())
        .is_some_and(|text| !text.trim().is_empty());
    if !text_present {
        return Err(VectorStoreError::InvalidRecord(format!(
            "id '{}' is missing chunk text",
            record.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{Quality, QualityClass};
    use crate::metadata::MetadataValue;
    use crate::vectorstore::types::ArticleContext;

    fn lp(id: &str) -> LandmarkId {
        LandmarkId::normalize(id).expect("valid id")
    }

    fn chunk(index: usize, total: usize) -> EmbeddedChunk {
        EmbeddedChunk {
            text: format!("chunk body {index}"),
            index,
            total,
            token_count: 3,
            embedding: vec![0.0; 4],
            metadata: FlatMetadata::new(),
        }
    }

    #[test]
    fn pdf_records_carry_standard_keys() {
        let mut landmark_meta = FlatMetadata::new();
        landmark_meta.insert("name", "Brooklyn Bridge");

        let records = build_records(
            &lp("LP-00009"),
            &SourceKind::Pdf,
            &[chunk(0, 2), chunk(1, 2)],
            &landmark_meta,
            "2025-06-01T00:00:00Z",
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "LP-00009-chunk-0");
        assert_eq!(records[1].id, "LP-00009-chunk-1");

        let metadata = &records[0].metadata;
        assert_eq!(
            metadata.get("landmark_id").and_then(MetadataValue::as_text),
            Some("LP-00009")
        );
        assert_eq!(
            metadata.get("source_type").and_then(MetadataValue::as_text),
            Some("pdf")
        );
        assert_eq!(
            metadata.get("chunk_index"),
            Some(&MetadataValue::Text("0".into()))
        );
        assert_eq!(
            metadata.get("total_chunks"),
            Some(&MetadataValue::Text("2".into()))
        );
        assert_eq!(
            metadata.get("processing_date").and_then(MetadataValue::as_text),
            Some("2025-06-01T00:00:00Z")
        );
        assert_eq!(
            metadata.get("name").and_then(MetadataValue::as_text),
            Some("Brooklyn Bridge")
        );
        assert!(metadata.get("text").is_some());
    }

    #[test]
    fn wikipedia_records_carry_attribution() {
        let kind = SourceKind::Wikipedia(ArticleContext {
            title: "Wyckoff House".into(),
            url: "https://en.wikipedia.org/wiki/Wyckoff_House".into(),
            revision_id: "1234567".into(),
            quality: Some(Quality {
                prediction: QualityClass::GA,
                score: 0.72,
                description: "Good article".into(),
            }),
        });

        let records = build_records(
            &lp("LP-00001"),
            &kind,
            &[chunk(0, 1)],
            &FlatMetadata::new(),
            "2025-06-01T00:00:00Z",
        );

        let metadata = &records[0].metadata;
        assert_eq!(records[0].id, "wiki-Wyckoff_House-LP-00001-chunk-0");
        assert_eq!(
            metadata.get("article_title").and_then(MetadataValue::as_text),
            Some("Wyckoff House")
        );
        assert_eq!(
            metadata
                .get("article_revision_id")
                .and_then(MetadataValue::as_text),
            Some("1234567")
        );
        assert_eq!(
            metadata.get("article_quality").and_then(MetadataValue::as_text),
            Some("GA")
        );
        assert_eq!(
            metadata.get("article_quality_score"),
            Some(&MetadataValue::Text("0.72".into()))
        );
    }

    #[test]
    fn standard_keys_override_landmark_metadata() {
        let mut landmark_meta = FlatMetadata::new();
        landmark_meta.insert("source_type", "bogus");
        landmark_meta.insert("text", "stale");

        let records = build_records(
            &lp("LP-00009"),
            &SourceKind::Pdf,
            &[chunk(0, 1)],
            &landmark_meta,
            "2025-06-01T00:00:00Z",
        );
        let metadata = &records[0].metadata;
        assert_eq!(
            metadata.get("source_type").and_then(MetadataValue::as_text),
            Some("pdf")
        );
        assert_eq!(
            metadata.get("text").and_then(MetadataValue::as_text),
            Some("chunk body 0")
        );
    }

    #[test]
    fn validation_rejects_bad_records() {
        let records = build_records(
            &lp("LP-00009"),
            &SourceKind::Pdf,
            &[chunk(0, 1)],
            &FlatMetadata::new(),
            "2025-06-01T00:00:00Z",
        );
        assert!(validate_record(&records[0], 4).is_ok());
        assert!(matches!(
            validate_record(&records[0], 1536),
            Err(VectorStoreError::InvalidRecord(_))
        ));

        let mut non_finite = records[0].clone();
        non_finite.values[1] = f32::NAN;
        assert!(validate_record(&non_finite, 4).is_err());

        let mut empty_text = records[0].clone();
        empty_text.metadata = FlatMetadata::new();
        assert!(validate_record(&empty_text, 4).is_err());
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }
}
