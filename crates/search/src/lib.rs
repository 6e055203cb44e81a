//! DocChat search library
//!
//! Online half of the workflow: leaf vector retrieval, auto-merging into parent
//! chunks and reranking.

pub mod engine;
pub mod postprocessor;
pub mod retrieval;

#[cfg(test)]
mod test_support;

pub use engine::QueryEngine;
pub use postprocessor::{RerankPostprocessor, RerankedContext};
pub use retrieval::{AutoMergingRetriever, Retriever, ScoredChunk, VectorRetriever};
