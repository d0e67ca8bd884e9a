//! Filter composition for index queries and deletes.
//!
//! The index speaks a Mongo-style filter dialect: `{"field": {"$eq": value}}` clauses
//! combined with `{"$and": [...]}`. Composition here is pure so the same helper backs
//! queries, replace-existing deletes, and tests.

use serde_json::{Value, json};

use crate::vectorstore::types::{SourceKind, SourceType};

/// AND together an optional base filter with optional landmark and source constraints.
///
/// Returns `None` when no constraint applies. A single clause is returned bare; two or
/// more clauses are wrapped in `$and`.
pub fn compose_filter(
    base: Option<Value>,
    landmark_id: Option<&str>,
    source_type: Option<SourceType>,
) -> Option<Value> {
    let mut clauses: Vec<Value> = Vec::new();

    if let Some(base) = base {
        clauses.push(base);
    }
    if let Some(landmark_id) = landmark_id.map(str::trim).filter(|value| !value.is_empty()) {
        clauses.push(json!({ "landmark_id": { "$eq": landmark_id } }));
    }
    if let Some(source_type) = source_type {
        clauses.push(json!({ "source_type": { "$eq": source_type.as_str() } }));
    }

    match clauses.len() {
        0 => None,
        1 => Some(clauses.remove(0)),
        _ => Some(json!({ "$and": clauses })),
    }
}

/// Filter selecting everything previously stored for `(landmark_id, kind)`.
///
/// Wikipedia deletes are additionally scoped by `article_title` so reprocessing one
/// article never disturbs a landmark's other articles.
pub fn replace_filter(landmark_id: &str, kind: &SourceKind) -> Value {
    let base = kind.article().map(|article| {
        json!({ "article_title": { "$eq": article.title } })
    });
    compose_filter(base, Some(landmark_id), Some(kind.source_type()))
        .expect("replace filter always has clauses")
}
