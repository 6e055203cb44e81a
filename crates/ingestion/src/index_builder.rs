//! Index building
//!
//! Embeds the leaves of a chunk hierarchy, stores every node in the docstore
//! and persists the result. Persistence goes through a staging directory so a
//! failed build never leaves a half-written index behind.

use chrono::Utc;
use docchat_common::embeddings::Embedder;
use docchat_common::errors::{AppError, Result};
use docchat_common::hierarchy::ChunkHierarchy;
use docchat_common::metrics;
use docchat_common::storage::{IndexMetadata, StorageContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::chunker::ChunkingConfig;

/// Outcome of a persisted build
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub persist_dir: PathBuf,
    pub node_count: usize,
    pub leaf_count: usize,
    pub depth: usize,
    pub duration_ms: u64,
}

/// Builds a [`StorageContext`] from a hierarchy
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig) -> Self {
        Self { embedder, chunking }
    }

    /// Embed every leaf and assemble the in-memory stores
    #[instrument(skip(self, hierarchy), fields(nodes = hierarchy.len()))]
    pub async fn build(&self, hierarchy: &ChunkHierarchy, source: Option<String>) -> Result<StorageContext> {
        if hierarchy.is_empty() {
            return Err(AppError::IndexBuild {
                message: "document produced no chunks".to_string(),
            });
        }

        let leaf_texts: Vec<String> = hierarchy.leaves().iter().map(|l| l.text.clone()).collect();
        debug!(leaves = leaf_texts.len(), model = self.embedder.model_name(), "Embedding leaves");

        let embeddings = self
            .embedder
            .embed_batch(&leaf_texts)
            .await
            .map_err(|e| AppError::IndexBuild {
                message: format!("embedding failed: {}", e),
            })?;

        let metadata = IndexMetadata {
            embedding_model: self.embedder.model_name().to_string(),
            embedding_dimension: self.embedder.dimension(),
            chunk_sizes: self.chunking.tier_sizes.clone(),
            size_unit: self.chunking.size_unit,
            node_count: hierarchy.len(),
            leaf_count: leaf_texts.len(),
            source,
            built_at: Utc::now(),
        };

        StorageContext::from_hierarchy(hierarchy, embeddings, metadata).map_err(|e| match e {
            AppError::IndexBuild { .. } => e,
            other => AppError::IndexBuild {
                message: other.to_string(),
            },
        })
    }

    /// Build and persist into `persist_dir`, replacing any previous index
    #[instrument(skip(self, hierarchy), fields(dir = %persist_dir.display()))]
    pub async fn build_and_persist(
        &self,
        hierarchy: &ChunkHierarchy,
        source: Option<String>,
        persist_dir: &Path,
    ) -> Result<IndexSummary> {
        let started = Instant::now();
        let storage = self.build(hierarchy, source).await?;

        let staging = staging_dir(persist_dir);
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(|e| AppError::IndexBuild {
                message: format!("failed to clear staging directory {}: {}", staging.display(), e),
            })?;
        }

        if let Err(e) = storage.persist(&staging).and_then(|_| swap_into_place(&staging, persist_dir)) {
            if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                warn!(dir = %staging.display(), error = %cleanup, "Failed to remove staging directory");
            }
            return Err(AppError::IndexBuild {
                message: format!("failed to persist index: {}", e),
            });
        }

        let duration = started.elapsed();
        metrics::record_index_build(
            duration.as_secs_f64(),
            storage.metadata.node_count,
            storage.metadata.leaf_count,
        );

        let summary = IndexSummary {
            persist_dir: persist_dir.to_path_buf(),
            node_count: storage.metadata.node_count,
            leaf_count: storage.metadata.leaf_count,
            depth: hierarchy.depth(),
            duration_ms: duration.as_millis() as u64,
        };

        info!(
            nodes = summary.node_count,
            leaves = summary.leaf_count,
            depth = summary.depth,
            duration_ms = summary.duration_ms,
            "Index built"
        );

        Ok(summary)
    }
}

fn sibling_dir(persist_dir: &Path, suffix: &str) -> PathBuf {
    let mut name = persist_dir.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// `<dir>.building`, next to the target directory
fn staging_dir(persist_dir: &Path) -> PathBuf {
    sibling_dir(persist_dir, ".building")
}

/// `<dir>.previous`, where the old index waits until the swap succeeds
fn backup_dir(persist_dir: &Path) -> PathBuf {
    sibling_dir(persist_dir, ".previous")
}

/// Move `staging` to `persist_dir`. The previous index is restored if the
/// final rename fails.
fn swap_into_place(staging: &Path, persist_dir: &Path) -> Result<()> {
    let backup = backup_dir(persist_dir);
    if backup.exists() {
        std::fs::remove_dir_all(&backup)?;
    }

    let had_previous = persist_dir.exists();
    if had_previous {
        std::fs::rename(persist_dir, &backup)?;
    }

    if let Err(e) = std::fs::rename(staging, persist_dir) {
        if had_previous {
            if let Err(restore) = std::fs::rename(&backup, persist_dir) {
                warn!(dir = %backup.display(), error = %restore, "Failed to restore previous index");
            }
        }
        return Err(e.into());
    }

    if had_previous {
        if let Err(e) = std::fs::remove_dir_all(&backup) {
            warn!(dir = %backup.display(), error = %e, "Failed to remove previous index");
        }
    }
    Ok(())
}
