//! Shared fixtures for the search tests

use async_trait::async_trait;
use chrono::Utc;
use docchat_common::embeddings::Embedder;
use docchat_common::errors::{AppError, Result};
use docchat_common::hierarchy::{Chunk, ChunkHierarchy, SizeUnit};
use docchat_common::storage::{IndexMetadata, StorageContext};
use std::sync::Arc;

pub const STUB_MODEL: &str = "stub-embedding";

/// Embeds every text onto the x axis, or fails on demand
pub struct StubEmbedder {
    fail: bool,
}

impl StubEmbedder {
    pub fn arc() -> Arc<dyn Embedder> {
        Arc::new(Self { fail: false })
    }

    pub fn failing() -> Arc<dyn Embedder> {
        Arc::new(Self { fail: true })
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(AppError::EmbeddingError {
                message: "stub embedder unavailable".to_string(),
            });
        }
        Ok(vec![1.0, 0.0])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        STUB_MODEL
    }

    fn dimension(&self) -> usize {
        2
    }
}

const P1_LEAVES: [&str; 4] = ["alpha one.", "beta two.", "gamma three.", "delta four."];
const P2_LEAVES: [&str; 2] = ["epsilon five.", "zeta six."];

/// Leaf texts in document order: four under the first parent, two under the second
pub fn leaf_texts() -> Vec<&'static str> {
    P1_LEAVES.iter().chain(P2_LEAVES.iter()).copied().collect()
}

fn parent_with_leaves(start: usize, leaves: &[&str], root_id: &str) -> (Chunk, Vec<Chunk>) {
    let text = leaves.join(" ");
    let mut parent = Chunk::new(1, start, &text, Some(root_id.to_string()));
    let mut offset = start;
    let mut children = Vec::new();
    for leaf in leaves {
        children.push(Chunk::new(2, offset, leaf, Some(parent.id.clone())));
        offset += leaf.len() + 1;
    }
    parent.child_ids = children.iter().map(|c| c.id.clone()).collect();
    (parent, children)
}

/// root -> {P1 -> 4 leaves, P2 -> 2 leaves}
pub fn sample_hierarchy() -> ChunkHierarchy {
    let p1_text = P1_LEAVES.join(" ");
    let root_text = format!("{} {}", p1_text, P2_LEAVES.join(" "));
    let mut root = Chunk::new(0, 0, &root_text, None);

    let (p1, p1_children) = parent_with_leaves(0, &P1_LEAVES, &root.id);
    let (p2, p2_children) = parent_with_leaves(p1_text.len() + 1, &P2_LEAVES, &root.id);
    root.child_ids = vec![p1.id.clone(), p2.id.clone()];

    let mut nodes = vec![root, p1];
    nodes.extend(p1_children);
    nodes.push(p2);
    nodes.extend(p2_children);
    ChunkHierarchy::new(nodes)
}

/// Storage whose leaves score exactly `scores` against the stub query vector
pub fn sample_storage(scores: &[f32; 6]) -> Arc<StorageContext> {
    let hierarchy = sample_hierarchy();
    let embeddings = scores
        .iter()
        .map(|&s| vec![s, (1.0 - s * s).max(0.0).sqrt()])
        .collect();
    let metadata = IndexMetadata {
        embedding_model: STUB_MODEL.to_string(),
        embedding_dimension: 2,
        chunk_sizes: vec![64, 32, 16],
        size_unit: SizeUnit::Characters,
        node_count: hierarchy.len(),
        leaf_count: hierarchy.leaves().len(),
        source: None,
        built_at: Utc::now(),
    };
    Arc::new(StorageContext::from_hierarchy(&hierarchy, embeddings, metadata).unwrap())
}

/// Id of the node whose text is exactly `text`
pub fn id_of(storage: &StorageContext, text: &str) -> String {
    storage
        .docstore
        .iter()
        .find(|c| c.text == text)
        .map(|c| c.id.clone())
        .unwrap()
}
