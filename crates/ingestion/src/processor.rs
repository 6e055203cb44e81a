//! Ingestion processor
//!
//! The offline half of the workflow: acquire the PDF, extract its text, build
//! the chunk hierarchy and persist the index.

use crate::acquirer::DocumentAcquirer;
use crate::chunker::{ChunkingConfig, HierarchicalChunker};
use crate::index_builder::{IndexBuilder, IndexSummary};
use crate::pdf::extract_text_from_pdf;
use docchat_common::config::AppConfig;
use docchat_common::embeddings::Embedder;
use docchat_common::errors::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Runs acquisition, extraction, chunking and index building in order
pub struct IngestionProcessor {
    acquirer: DocumentAcquirer,
    chunker: HierarchicalChunker,
    builder: IndexBuilder,
    config: Arc<AppConfig>,
}

impl IngestionProcessor {
    pub fn new(config: Arc<AppConfig>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let chunking = ChunkingConfig::from(&config.index);
        Ok(Self {
            acquirer: DocumentAcquirer::new(config.download_timeout())?,
            chunker: HierarchicalChunker::new(chunking.clone())?,
            builder: IndexBuilder::new(embedder, chunking),
            config,
        })
    }

    /// Replace the default acquirer (custom HTTP client)
    pub fn with_acquirer(mut self, acquirer: DocumentAcquirer) -> Self {
        self.acquirer = acquirer;
        self
    }

    /// Download the configured source and index it
    #[instrument(skip(self))]
    pub async fn process_source(&self, locator: &str) -> Result<IndexSummary> {
        info!("Downloading source document...");
        let path = self
            .acquirer
            .acquire(locator, &self.config.source.download_dir, &self.config.source.file_name)
            .await?;

        self.process_local_pdf(&path).await
    }

    /// Index a PDF that is already on disk
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn process_local_pdf(&self, path: &Path) -> Result<IndexSummary> {
        info!("Extracting text from PDF...");
        let text = extract_text_from_pdf(path)?;

        info!(chars = text.len(), "Chunking text...");
        let hierarchy = self.chunker.chunk(&text);

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string());

        info!(nodes = hierarchy.len(), leaves = hierarchy.leaves().len(), "Building index...");
        self.builder
            .build_and_persist(&hierarchy, source, &self.config.index.persist_dir)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::tests::write_pdf;
    use docchat_common::embeddings::HashEmbedder;
    use docchat_common::errors::AppError;
    use docchat_common::hierarchy::SizeUnit;
    use docchat_common::storage::StorageContext;

    fn config(root: &Path) -> Arc<AppConfig> {
        let mut config = AppConfig::default();
        config.source.download_dir = root.join("pdfs");
        config.index.persist_dir = root.join("merging_index");
        config.index.chunk_sizes = vec![120, 40];
        config.index.size_unit = SizeUnit::Characters;
        config.embedding.provider = "hash".to_string();
        config.embedding.model = HashEmbedder::MODEL_NAME.to_string();
        config.embedding.dimension = 64;
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_process_local_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("paper.pdf");
        write_pdf(
            &pdf,
            &[
                "Hierarchical chunking splits a document into nested tiers of text.",
                "Auto merging retrieval replaces sibling leaves with their parent.",
            ],
        );

        let config = config(dir.path());
        let processor = IngestionProcessor::new(config.clone(), Arc::new(HashEmbedder::new(64))).unwrap();
        let summary = processor.process_local_pdf(&pdf).await.unwrap();

        assert!(summary.leaf_count > 1);
        let storage = StorageContext::load(&config.index.persist_dir).unwrap();
        assert_eq!(storage.metadata.source.as_deref(), Some("paper.pdf"));
        assert!(storage.ensure_embedding_model(HashEmbedder::MODEL_NAME, 64).is_ok());
    }

    #[tokio::test]
    async fn test_malformed_source_fails_before_indexing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let processor = IngestionProcessor::new(config.clone(), Arc::new(HashEmbedder::new(64))).unwrap();

        let err = processor
            .process_source("https://drive.google.com/drive/my-drive")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedLocator { .. }));
        assert!(!config.index.persist_dir.exists());
    }
}
