//! Leaf vector search
//!
//! Brute-force cosine similarity over the leaf embeddings of the loaded index.

use super::{into_retrieval_error, Retriever, ScoredChunk};
use docchat_common::embeddings::Embedder;
use docchat_common::errors::{AppError, Result};
use docchat_common::storage::{StorageContext, VectorMatch};
use std::sync::Arc;
use tracing::debug;

/// Top-K leaf retriever
pub struct VectorRetriever {
    storage: Arc<StorageContext>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl VectorRetriever {
    pub fn new(storage: Arc<StorageContext>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            storage,
            embedder,
            top_k,
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<VectorMatch>> {
        // Blank queries skip the embedding call and score every leaf 0.0
        if query.trim().is_empty() {
            debug!(top_k = self.top_k, "Blank query, returning leaves in document order");
            return Ok(self.storage.vector_store.first_k(self.top_k));
        }

        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| AppError::retrieval(format!("query embedding failed: {}", e)))?;

        self.storage.vector_store.query(&embedding, self.top_k)
    }
}

#[async_trait::async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let matches = self.search(query).await.map_err(into_retrieval_error)?;

        matches
            .into_iter()
            .enumerate()
            .map(|(rank, m)| {
                let chunk = self
                    .storage
                    .docstore
                    .get_node(&m.chunk_id)
                    .map_err(into_retrieval_error)?
                    .clone();
                Ok(ScoredChunk {
                    chunk,
                    score: m.score,
                    rank,
                })
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "vector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{leaf_texts, sample_storage, StubEmbedder};

    #[tokio::test]
    async fn test_returns_top_k_by_similarity() {
        let storage = sample_storage(&[0.2, 0.9, 0.1, 0.5, 0.3, 0.4]);
        let retriever = VectorRetriever::new(storage, StubEmbedder::arc(), 3);

        let results = retriever.retrieve("which leaf?").await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        let leaves = leaf_texts();
        assert_eq!(texts, vec![leaves[1], leaves[3], leaves[5]]);
        assert_eq!(results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!((results[0].score - 0.9).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_k_larger_than_leaf_count() {
        let storage = sample_storage(&[0.2, 0.9, 0.1, 0.5, 0.3, 0.4]);
        let retriever = VectorRetriever::new(storage, StubEmbedder::arc(), 50);
        assert_eq!(retriever.retrieve("anything").await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_blank_query_skips_embedding() {
        let storage = sample_storage(&[0.2, 0.9, 0.1, 0.5, 0.3, 0.4]);
        let retriever = VectorRetriever::new(storage, StubEmbedder::failing(), 2);

        let results = retriever.retrieve("   ").await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, leaf_texts()[..2].to_vec());
        assert!(results.iter().all(|r| r.score == 0.0));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_retrieval_error() {
        let storage = sample_storage(&[0.2, 0.9, 0.1, 0.5, 0.3, 0.4]);
        let retriever = VectorRetriever::new(storage, StubEmbedder::failing(), 2);

        let err = retriever.retrieve("real question").await.unwrap_err();
        assert!(matches!(err, AppError::Retrieval { .. }));
    }
}
