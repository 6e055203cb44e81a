//! Retrieval over the persisted chunk hierarchy
//!
//! Two stages:
//! - Vector search over leaf embeddings
//! - Auto-merging of retrieved siblings into their parent chunk

mod auto_merging;
mod vector;

pub use auto_merging::{has_overlap, AutoMergingRetriever};
pub use vector::VectorRetriever;

use docchat_common::errors::{AppError, Result};
use docchat_common::hierarchy::Chunk;
use std::cmp::Ordering;

/// Retrieved chunk with relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,

    /// Similarity (or rerank) score
    pub score: f32,

    /// Position in the initial leaf retrieval; merged parents carry the best
    /// rank among the children they replaced
    pub rank: usize,
}

impl ScoredChunk {
    pub fn id(&self) -> &str {
        &self.chunk.id
    }
}

/// Common trait for all retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve chunks matching the query, best first
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>>;

    fn name(&self) -> &'static str;
}

/// Descending score, ties broken by retrieval rank
pub fn sort_by_score(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.rank.cmp(&b.rank))
    });
}

/// Any failure while retrieving surfaces as a retrieval error
pub(crate) fn into_retrieval_error(err: AppError) -> AppError {
    match err {
        AppError::Retrieval { .. } => err,
        other => AppError::retrieval(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(text: &str, score: f32, rank: usize) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(1, 0, text, None),
            score,
            rank,
        }
    }

    #[test]
    fn test_sort_by_score_breaks_ties_by_rank() {
        let mut chunks = vec![
            scored("c", 0.5, 2),
            scored("a", 0.9, 1),
            scored("b", 0.5, 0),
        ];
        sort_by_score(&mut chunks);
        let order: Vec<&str> = chunks.iter().map(|c| c.chunk.text.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_error_mapping() {
        let err = into_retrieval_error(AppError::storage("missing node"));
        assert!(matches!(err, AppError::Retrieval { .. }));
        assert!(err.to_string().contains("missing node"));
    }
}
