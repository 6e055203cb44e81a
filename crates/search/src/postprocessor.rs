//! Rerank postprocessor
//!
//! Re-scores the merged retrieval result with a relevance model and keeps the
//! best `top_n`. A failing reranker degrades to the retrieval order.

use crate::retrieval::ScoredChunk;
use docchat_common::metrics;
use docchat_common::rerank::Reranker;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// Context handed to generation
#[derive(Debug, Clone, Default)]
pub struct RerankedContext {
    pub chunks: Vec<ScoredChunk>,

    /// Why reranking was skipped, when it was
    pub fallback: Option<String>,
}

impl RerankedContext {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.chunk.text.as_str()).collect()
    }
}

pub struct RerankPostprocessor {
    reranker: Arc<dyn Reranker>,
    top_n: usize,
}

impl RerankPostprocessor {
    pub fn new(reranker: Arc<dyn Reranker>, top_n: usize) -> Self {
        Self { reranker, top_n }
    }

    /// Sort by reranker score (stable on ties) and truncate to `top_n`
    pub async fn postprocess(&self, query: &str, chunks: Vec<ScoredChunk>) -> RerankedContext {
        if chunks.is_empty() {
            return RerankedContext::default();
        }

        let passages: Vec<String> = chunks.iter().map(|c| c.chunk.text.clone()).collect();

        match self.reranker.score(query, &passages).await {
            Ok(scores) if scores.len() == chunks.len() => {
                let mut rescored: Vec<ScoredChunk> = chunks
                    .into_iter()
                    .zip(scores)
                    .map(|(mut chunk, score)| {
                        chunk.score = score;
                        chunk
                    })
                    .collect();
                rescored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
                rescored.truncate(self.top_n);

                debug!(
                    model = self.reranker.model_name(),
                    kept = rescored.len(),
                    "Reranked retrieval results"
                );

                RerankedContext {
                    chunks: rescored,
                    fallback: None,
                }
            }
            Ok(scores) => self.fall_back(
                chunks,
                format!("reranker returned {} scores for {} passages", scores.len(), passages.len()),
            ),
            Err(e) => self.fall_back(chunks, e.to_string()),
        }
    }

    fn fall_back(&self, mut chunks: Vec<ScoredChunk>, reason: String) -> RerankedContext {
        warn!(
            model = self.reranker.model_name(),
            reason = %reason,
            "Rerank failed, keeping retrieval order"
        );
        metrics::record_rerank_fallback();

        chunks.truncate(self.top_n);
        RerankedContext {
            chunks,
            fallback: Some(reason),
        }
    }
}
