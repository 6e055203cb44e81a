//! Persisted index storage
//!
//! A single directory holds three JSON files:
//! - `docstore.json`: every chunk of every tier, keyed by id
//! - `vector_store.json`: leaf id -> embedding, in document order
//! - `index_store.json`: build metadata (embedding model, tiers, counts)
//!
//! Maps serialize in sorted order, so save -> load -> save is byte-stable.

use crate::errors::{AppError, Result};
use crate::hierarchy::{Chunk, ChunkHierarchy, ChunkId, SizeUnit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const DOCSTORE_FILE: &str = "docstore.json";
pub const VECTOR_STORE_FILE: &str = "vector_store.json";
pub const INDEX_STORE_FILE: &str = "index_store.json";

/// Id -> chunk mapping for all tiers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocStore {
    nodes: BTreeMap<ChunkId, Chunk>,
}

impl DocStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_documents<'a>(&mut self, chunks: impl IntoIterator<Item = &'a Chunk>) {
        for chunk in chunks {
            self.nodes.insert(chunk.id.clone(), chunk.clone());
        }
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.nodes.get(id)
    }

    /// Look up a chunk that must exist
    pub fn get_node(&self, id: &str) -> Result<&Chunk> {
        self.nodes
            .get(id)
            .ok_or_else(|| AppError::storage(format!("chunk {} not found in docstore", id)))
    }

    /// Whether `ancestor_id` is a strict ancestor of `id`
    pub fn is_ancestor(&self, ancestor_id: &str, id: &str) -> bool {
        let mut current = self.get(id).and_then(|c| c.parent_id.as_deref());
        while let Some(parent) = current {
            if parent == ancestor_id {
                return true;
            }
            current = self.get(parent).and_then(|c| c.parent_id.as_deref());
        }
        false
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.nodes.values()
    }
}

/// Leaf id paired with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub chunk_id: ChunkId,
    pub embedding: Vec<f32>,
}

/// Vector similarity match
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub chunk_id: ChunkId,
    pub score: f32,
}

/// Brute-force cosine store over leaf embeddings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimpleVectorStore {
    dimension: usize,
    entries: Vec<VectorEntry>,
}

impl SimpleVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, chunk_id: ChunkId, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(AppError::storage(format!(
                "embedding for {} has dimension {}, store expects {}",
                chunk_id,
                embedding.len(),
                self.dimension
            )));
        }
        self.entries.push(VectorEntry { chunk_id, embedding });
        Ok(())
    }

    /// Top `k` entries by cosine similarity; ties keep insertion (document) order
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        if query.len() != self.dimension {
            return Err(AppError::storage(format!(
                "query vector has dimension {}, store expects {}",
                query.len(),
                self.dimension
            )));
        }

        let mut matches: Vec<VectorMatch> = self
            .entries
            .iter()
            .map(|e| VectorMatch {
                chunk_id: e.chunk_id.clone(),
                score: cosine_similarity(query, &e.embedding),
            })
            .collect();

        // sort_by is stable
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(k);
        Ok(matches)
    }

    /// First `k` entries in document order with a zero score
    pub fn first_k(&self, k: usize) -> Vec<VectorMatch> {
        self.entries
            .iter()
            .take(k)
            .map(|e| VectorMatch {
                chunk_id: e.chunk_id.clone(),
                score: 0.0,
            })
            .collect()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[VectorEntry] {
        &self.entries
    }
}

/// Cosine similarity; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

/// Build metadata stored next to the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chunk_sizes: Vec<usize>,
    pub size_unit: SizeUnit,
    pub node_count: usize,
    pub leaf_count: usize,
    pub source: Option<String>,
    pub built_at: DateTime<Utc>,
}

/// Docstore + vector store + metadata, loaded and saved together
#[derive(Debug, Clone)]
pub struct StorageContext {
    pub docstore: DocStore,
    pub vector_store: SimpleVectorStore,
    pub metadata: IndexMetadata,
}

impl StorageContext {
    /// Assemble a context from a hierarchy and leaf embeddings (in leaf order)
    pub fn from_hierarchy(
        hierarchy: &ChunkHierarchy,
        embeddings: Vec<Vec<f32>>,
        metadata: IndexMetadata,
    ) -> Result<Self> {
        let leaves = hierarchy.leaves();
        if leaves.len() != embeddings.len() {
            return Err(AppError::IndexBuild {
                message: format!(
                    "{} leaves but {} embeddings",
                    leaves.len(),
                    embeddings.len()
                ),
            });
        }

        let mut docstore = DocStore::new();
        docstore.add_documents(hierarchy.nodes());

        let mut vector_store = SimpleVectorStore::new(metadata.embedding_dimension);
        for (leaf, embedding) in leaves.into_iter().zip(embeddings) {
            vector_store.add(leaf.id.clone(), embedding)?;
        }

        Ok(Self {
            docstore,
            vector_store,
            metadata,
        })
    }

    /// Write the three store files into `dir` (created if absent)
    pub fn persist(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(DOCSTORE_FILE), serde_json::to_vec_pretty(&self.docstore)?)?;
        fs::write(dir.join(VECTOR_STORE_FILE), serde_json::to_vec(&self.vector_store)?)?;
        fs::write(dir.join(INDEX_STORE_FILE), serde_json::to_vec_pretty(&self.metadata)?)?;

        info!(
            dir = %dir.display(),
            nodes = self.docstore.len(),
            vectors = self.vector_store.len(),
            "Storage context persisted"
        );
        Ok(())
    }

    /// Load a previously persisted directory
    pub fn load(dir: &Path) -> Result<Self> {
        let load_err = |message: String| AppError::IndexLoad {
            path: dir.display().to_string(),
            message,
        };

        let read = |file: &str| {
            fs::read(dir.join(file)).map_err(|e| load_err(format!("{}: {}", file, e)))
        };

        let docstore: DocStore = serde_json::from_slice(&read(DOCSTORE_FILE)?)
            .map_err(|e| load_err(format!("{}: {}", DOCSTORE_FILE, e)))?;
        let vector_store: SimpleVectorStore = serde_json::from_slice(&read(VECTOR_STORE_FILE)?)
            .map_err(|e| load_err(format!("{}: {}", VECTOR_STORE_FILE, e)))?;
        let metadata: IndexMetadata = serde_json::from_slice(&read(INDEX_STORE_FILE)?)
            .map_err(|e| load_err(format!("{}: {}", INDEX_STORE_FILE, e)))?;

        if let Some(missing) = vector_store
            .entries()
            .iter()
            .find(|e| docstore.get(&e.chunk_id).is_none())
        {
            return Err(load_err(format!(
                "vector entry {} has no docstore node",
                missing.chunk_id
            )));
        }

        debug!(
            dir = %dir.display(),
            nodes = docstore.len(),
            vectors = vector_store.len(),
            model = %metadata.embedding_model,
            "Storage context loaded"
        );

        Ok(Self {
            docstore,
            vector_store,
            metadata,
        })
    }

    /// Refuse to query with a different embedding model than the index was built with
    pub fn ensure_embedding_model(&self, model: &str, dimension: usize) -> Result<()> {
        if self.metadata.embedding_model != model || self.metadata.embedding_dimension != dimension {
            return Err(AppError::IndexLoad {
                path: String::new(),
                message: format!(
                    "index was built with {} ({} dims) but {} ({} dims) is configured",
                    self.metadata.embedding_model,
                    self.metadata.embedding_dimension,
                    model,
                    dimension
                ),
            });
        }
        Ok(())
    }
}
