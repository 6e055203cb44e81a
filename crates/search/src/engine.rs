//! Query engine
//!
//! Auto-merging retrieval followed by reranking, configured from `AppConfig`.

use crate::postprocessor::{RerankPostprocessor, RerankedContext};
use crate::retrieval::{AutoMergingRetriever, Retriever, VectorRetriever};
use docchat_common::config::AppConfig;
use docchat_common::embeddings::Embedder;
use docchat_common::errors::Result;
use docchat_common::rerank::Reranker;
use docchat_common::storage::StorageContext;
use std::sync::Arc;
use tracing::{info, instrument};

/// Retrieval + rerank pipeline over one loaded index
pub struct QueryEngine {
    retriever: AutoMergingRetriever,
    postprocessor: RerankPostprocessor,
}

impl QueryEngine {
    pub fn new(retriever: AutoMergingRetriever, postprocessor: RerankPostprocessor) -> Self {
        Self {
            retriever,
            postprocessor,
        }
    }

    /// Wire the pipeline from configuration; the embedder must match the index
    pub fn from_config(
        config: &AppConfig,
        storage: Arc<StorageContext>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
    ) -> Result<Self> {
        storage.ensure_embedding_model(embedder.model_name(), embedder.dimension())?;

        let leaves = VectorRetriever::new(storage.clone(), embedder, config.retrieval.similarity_top_k);
        let retriever = AutoMergingRetriever::new(Arc::new(leaves), storage, config.retrieval.merge_ratio_threshold)
            .with_gap_filling(config.retrieval.fill_gaps);
        let postprocessor = RerankPostprocessor::new(reranker, config.rerank.top_n);

        info!(
            top_k = config.retrieval.similarity_top_k,
            threshold = config.retrieval.merge_ratio_threshold,
            top_n = config.rerank.top_n,
            "Query engine ready"
        );

        Ok(Self::new(retriever, postprocessor))
    }

    /// Context chunks for `query`, best first
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn retrieve(&self, query: &str) -> Result<RerankedContext> {
        let merged = self.retriever.retrieve(query).await?;
        Ok(self.postprocessor.postprocess(query, merged).await)
    }
}
