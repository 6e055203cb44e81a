//! DocChat Common Library
//!
//! Shared code for the DocChat crates including:
//! - Configuration management
//! - Error types and handling
//! - The chunk hierarchy data model
//! - Persisted docstore / vector store
//! - Embedding, rerank and language model clients
//! - Metrics

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod hierarchy;
pub mod llm;
pub mod metrics;
pub mod rerank;
pub mod storage;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use hierarchy::{Chunk, ChunkHierarchy, ChunkId};
pub use llm::LanguageModel;
pub use rerank::Reranker;
pub use storage::StorageContext;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
