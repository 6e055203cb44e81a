//! DocChat ingestion library
//!
//! Offline index construction: download the source PDF, extract its text,
//! split it into a chunk hierarchy and persist the embedded index.

pub mod acquirer;
pub mod chunker;
pub mod index_builder;
pub mod pdf;
pub mod processor;

pub use acquirer::DocumentAcquirer;
pub use chunker::{ChunkingConfig, HierarchicalChunker};
pub use index_builder::{IndexBuilder, IndexSummary};
pub use processor::IngestionProcessor;
