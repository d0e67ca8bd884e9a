//! Vector index integration.
//!
//! The adapter in this module is the only component permitted to mutate the external
//! index. It owns deterministic ID generation, metadata preparation and validation,
//! batched upserts with retry, delete-by-filter, and correlation-traced filtered
//! queries.

pub mod adapter;
pub mod client;
pub mod filters;
pub mod ids;
pub mod records;
pub mod types;

pub use adapter::VectorStoreAdapter;
pub use client::IndexClient;
pub use filters::compose_filter;
pub use ids::{make_vector_id, slug, source_type_of_id};
pub use types::{
    ArticleContext, EmbeddedChunk, IndexStats, QueryArgs, SourceKind, SourceType,
    ValidationReport, VectorMatch, VectorRecord, VectorStoreError,
};
