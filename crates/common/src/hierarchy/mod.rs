//! Chunk hierarchy data model
//!
//! A document is split into tiers of decreasing size. Every chunk knows its
//! parent and its ordered children; leaves are the chunks without children and
//! are the only ones that get embedded.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Identifier of a chunk (hex digest, stable across rebuilds)
pub type ChunkId = String;

/// Characters per token used for the approximate token unit
pub const CHARS_PER_TOKEN: usize = 4;

/// Unit that tier sizes are expressed in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeUnit {
    /// ~4 characters per token
    #[default]
    ApproxTokens,
    /// Raw characters
    Characters,
}

impl SizeUnit {
    /// Convert a tier size into a character budget
    pub fn to_chars(self, size: usize) -> usize {
        match self {
            SizeUnit::ApproxTokens => size.saturating_mul(CHARS_PER_TOKEN),
            SizeUnit::Characters => size,
        }
    }
}

/// Check that tier sizes are non-empty, non-zero and strictly decreasing
pub fn validate_tier_sizes(sizes: &[usize]) -> Result<()> {
    if sizes.is_empty() {
        return Err(AppError::config("chunk sizes must contain at least one tier"));
    }
    if sizes.iter().any(|&s| s == 0) {
        return Err(AppError::config("chunk sizes must be greater than zero"));
    }
    if let Some(pair) = sizes.windows(2).find(|w| w[0] <= w[1]) {
        return Err(AppError::config(format!(
            "chunk sizes must be strictly decreasing, found {} followed by {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// A contiguous span of the source text at one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    /// 0 = coarsest
    pub tier: usize,
    pub parent_id: Option<ChunkId>,
    pub child_ids: Vec<ChunkId>,
    /// Byte offset of the span start in the source document
    pub start: usize,
    /// Byte offset one past the span end
    pub end: usize,
}

impl Chunk {
    pub fn new(tier: usize, start: usize, text: &str, parent_id: Option<ChunkId>) -> Self {
        let end = start + text.len();
        Self {
            id: Self::compute_id(tier, start, end, text),
            text: text.to_string(),
            tier,
            parent_id,
            child_ids: Vec::new(),
            start,
            end,
        }
    }

    /// Deterministic id: first 16 bytes of sha256(tier:start:end:text)
    pub fn compute_id(tier: usize, start: usize, end: usize, text: &str) -> ChunkId {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}:", tier, start, end).as_bytes());
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..16])
    }

    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Rough token count (~4 chars per token)
    pub fn token_estimate(&self) -> usize {
        self.text.len().div_ceil(CHARS_PER_TOKEN)
    }
}

/// All chunks of one document, in pre-order (parents before their children,
/// leaves in document order)
#[derive(Debug, Clone, Default)]
pub struct ChunkHierarchy {
    nodes: Vec<Chunk>,
    positions: HashMap<ChunkId, usize>,
}

impl ChunkHierarchy {
    pub fn new(nodes: Vec<Chunk>) -> Self {
        let positions = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        Self { nodes, positions }
    }

    pub fn nodes(&self) -> &[Chunk] {
        &self.nodes
    }

    /// Chunks without children, in document order
    pub fn leaves(&self) -> Vec<&Chunk> {
        self.nodes.iter().filter(|n| n.is_leaf()).collect()
    }

    pub fn roots(&self) -> Vec<&Chunk> {
        self.nodes.iter().filter(|n| n.is_root()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.positions.get(id).map(|&i| &self.nodes[i])
    }

    pub fn children_of(&self, id: &str) -> Vec<&Chunk> {
        self.get(id)
            .map(|n| n.child_ids.iter().filter_map(|c| self.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of tiers actually present
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.tier + 1).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family() -> ChunkHierarchy {
        let text = "alpha beta";
        let mut root = Chunk::new(0, 0, text, None);
        let a = Chunk::new(1, 0, "alpha", Some(root.id.clone()));
        let b = Chunk::new(1, 6, "beta", Some(root.id.clone()));
        root.child_ids = vec![a.id.clone(), b.id.clone()];
        ChunkHierarchy::new(vec![root, a, b])
    }

    #[test]
    fn test_ids_are_deterministic() {
        let a = Chunk::new(2, 10, "some text", None);
        let b = Chunk::new(2, 10, "some text", None);
        let c = Chunk::new(1, 10, "some text", None);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 32);
        assert_eq!(a.end, 19);
    }

    #[test]
    fn test_leaves_and_roots() {
        let h = family();
        assert_eq!(h.len(), 3);
        assert_eq!(h.depth(), 2);
        assert_eq!(h.roots().len(), 1);
        let leaves: Vec<&str> = h.leaves().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(leaves, vec!["alpha", "beta"]);
        let root_id = h.roots()[0].id.clone();
        assert_eq!(h.children_of(&root_id).len(), 2);
    }

    #[test]
    fn test_validate_tier_sizes() {
        assert!(validate_tier_sizes(&[2048, 512, 128]).is_ok());
        assert!(validate_tier_sizes(&[128]).is_ok());
        assert!(validate_tier_sizes(&[]).is_err());
        assert!(validate_tier_sizes(&[512, 0]).is_err());
        assert!(validate_tier_sizes(&[128, 512]).is_err());
    }

    #[test]
    fn test_size_unit_conversion() {
        assert_eq!(SizeUnit::ApproxTokens.to_chars(128), 512);
        assert_eq!(SizeUnit::Characters.to_chars(128), 128);
        assert_eq!(Chunk::new(0, 0, "abcde", None).token_estimate(), 2);
    }
}
