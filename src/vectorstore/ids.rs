//! Deterministic vector-ID generation.
//!
//! IDs are the idempotency key for upserts: regenerating for the same
//! `(landmark_id, article_title, chunk_index)` yields the same string, and the source
//! type is recoverable from the prefix (`wiki-` means Wikipedia, everything else is a
//! PDF report).

use std::sync::OnceLock;

use regex::Regex;

use crate::catalog::LandmarkId;
use crate::vectorstore::types::{SourceKind, SourceType};

/// Reduce an article title to the restricted character set used in vector IDs:
/// spaces become `_`, everything outside `[A-Za-z0-9_-]` is stripped.
pub fn slug(title: &str) -> String {
    title
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
            _ => None,
        })
        .collect()
}

/// Build the deterministic ID for one chunk.
pub fn make_vector_id(kind: &SourceKind, landmark_id: &LandmarkId, index: usize) -> String {
    match kind {
        SourceKind::Pdf => format!("{landmark_id}-chunk-{index}"),
        SourceKind::Wikipedia(article) => {
            format!("wiki-{}-{landmark_id}-chunk-{index}", slug(&article.title))
        }
    }
}

/// Recover the source type encoded in an ID prefix.
pub fn source_type_of_id(id: &str) -> SourceType {
    if id.starts_with("wiki-") {
        SourceType::Wikipedia
    } else {
        SourceType::Pdf
    }
}

fn pdf_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^LP-\d{5}-chunk-\d+$").expect("valid pdf id regex"))
}

fn wiki_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^wiki-[A-Za-z0-9_\-]+-LP-\d{5}-chunk-\d+$").expect("valid wiki id regex")
    })
}

/// Whether `id` matches the deterministic pattern for its own prefix.
pub fn id_is_well_formed(id: &str) -> bool {
    match source_type_of_id(id) {
        SourceType::Pdf => pdf_id_regex().is_match(id),
        SourceType::Wikipedia => wiki_id_regex().is_match(id),
    }
}
