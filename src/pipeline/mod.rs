//! Processors and the ingestion orchestrator.

pub mod chunker;
pub mod orchestrator;
pub mod pdf;
pub mod types;
pub mod wikipedia;

pub use chunker::{Chunk, ChunkError, Chunker};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use pdf::PdfProcessor;
pub use types::{BatchRunReport, BatchStatistics, LandmarkProcessor, Outcome, ProcessingResult};
pub use wikipedia::WikipediaProcessor;
