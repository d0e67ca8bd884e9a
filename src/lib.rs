#![deny(missing_docs)]

//! Core library for the NYC landmarks vector pipeline.

/// HTTP routing and REST handlers for the query API.
pub mod api;
/// Landmark registry REST client.
pub mod catalog;
/// Environment-driven configuration management.
pub mod config;
/// Ambient correlation-ID propagation.
pub mod correlation;
/// Embedding client abstraction and HTTP provider adapter.
pub mod embedding;
/// Source document fetchers (PDF reports, Wikipedia articles).
pub mod fetch;
/// Structured logging and tracing setup.
pub mod logging;
/// Flat metadata container and the enhanced metadata collector.
pub mod metadata;
/// Processors and the ingestion orchestrator.
pub mod pipeline;
/// Query service composing embedding, filtered search, and attribution.
pub mod query;
/// Retry policy and combinator shared by all external calls.
pub mod retry;
/// Vector index integration.
pub mod vectorstore;
