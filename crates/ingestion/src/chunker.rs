//! Hierarchical text chunking
//!
//! Splits a document into a forest of chunks at decreasing granularities. Each
//! tier is produced by running a `text-splitter` over the text of its parent
//! chunk, so boundaries prefer paragraph and sentence breaks over hard cuts.

use docchat_common::config::IndexConfig;
use docchat_common::errors::Result;
use docchat_common::hierarchy::{validate_tier_sizes, Chunk, ChunkHierarchy, ChunkId, SizeUnit};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Tier sizes and the unit they are measured in
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkingConfig {
    /// Coarsest first, strictly decreasing
    pub tier_sizes: Vec<usize>,
    pub size_unit: SizeUnit,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            tier_sizes: vec![2048, 512, 128],
            size_unit: SizeUnit::ApproxTokens,
        }
    }
}

impl From<&IndexConfig> for ChunkingConfig {
    fn from(config: &IndexConfig) -> Self {
        Self {
            tier_sizes: config.chunk_sizes.clone(),
            size_unit: config.size_unit,
        }
    }
}

/// Splits text into a [`ChunkHierarchy`]
pub struct HierarchicalChunker {
    /// Character budget per tier
    capacities: Vec<usize>,
    splitters: Vec<TextSplitter<text_splitter::Characters>>,
}

impl HierarchicalChunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        validate_tier_sizes(&config.tier_sizes)?;

        let capacities: Vec<usize> = config
            .tier_sizes
            .iter()
            .map(|&size| config.size_unit.to_chars(size))
            .collect();

        let splitters = capacities
            .iter()
            .map(|&chars| TextSplitter::new(ChunkConfig::new(chars)))
            .collect();

        Ok(Self {
            capacities,
            splitters,
        })
    }

    /// Build the hierarchy for `text`; blank text yields an empty hierarchy
    pub fn chunk(&self, text: &str) -> ChunkHierarchy {
        let mut nodes = Vec::new();

        if text.trim().is_empty() {
            debug!("Empty text, no chunks produced");
            return ChunkHierarchy::new(nodes);
        }

        for (offset, piece) in self.split(0, text) {
            self.build_node(0, offset, piece, None, &mut nodes);
        }

        let hierarchy = ChunkHierarchy::new(nodes);
        debug!(
            input_len = text.len(),
            nodes = hierarchy.len(),
            leaves = hierarchy.leaves().len(),
            depth = hierarchy.depth(),
            "Text chunked"
        );
        hierarchy
    }

    /// Pieces of `text` at `tier`, with byte offsets relative to `text`
    fn split<'t>(&self, tier: usize, text: &'t str) -> Vec<(usize, &'t str)> {
        if text.chars().count() <= self.capacities[tier] {
            let trimmed_start = text.trim_start();
            let offset = text.len() - trimmed_start.len();
            return vec![(offset, trimmed_start.trim_end())];
        }
        self.splitters[tier].chunk_indices(text).collect()
    }

    /// Push `text` as a chunk at `tier` (pre-order), then its children
    fn build_node(
        &self,
        tier: usize,
        start: usize,
        text: &str,
        parent_id: Option<ChunkId>,
        nodes: &mut Vec<Chunk>,
    ) -> ChunkId {
        let chunk = Chunk::new(tier, start, text, parent_id);
        let id = chunk.id.clone();
        let position = nodes.len();
        nodes.push(chunk);

        let next = tier + 1;
        if next < self.capacities.len() && text.chars().count() > self.capacities[next] {
            let child_ids: Vec<ChunkId> = self
                .split(next, text)
                .into_iter()
                .map(|(offset, piece)| self.build_node(next, start + offset, piece, Some(id.clone()), nodes))
                .collect();
            nodes[position].child_ids = child_ids;
        }

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const WORDS: &[&str] = &[
        "retrieval", "merge", "parent", "leaf", "vector", "index", "query", "rust",
        "ownership", "borrow", "a", "the", "of", "document", "chunk", "tier", "score",
    ];

    fn random_document(seed: u64) -> String {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut doc = String::new();
        let paragraphs = rng.gen_range(1..12);
        for p in 0..paragraphs {
            if p > 0 {
                doc.push_str("\n\n");
            }
            for s in 0..rng.gen_range(1..10) {
                if s > 0 {
                    doc.push(' ');
                }
                let words = rng.gen_range(3..25);
                let sentence: Vec<&str> = (0..words).map(|_| WORDS[rng.gen_range(0..WORDS.len())]).collect();
                doc.push_str(&sentence.join(" "));
                doc.push('.');
            }
        }
        doc
    }

    fn chunker(sizes: &[usize]) -> HierarchicalChunker {
        HierarchicalChunker::new(ChunkingConfig {
            tier_sizes: sizes.to_vec(),
            size_unit: SizeUnit::Characters,
        })
        .unwrap()
    }

    /// Structural checks shared by every generated document
    fn assert_well_formed(text: &str, chunker: &HierarchicalChunker, hierarchy: &ChunkHierarchy) {
        for node in hierarchy.nodes() {
            assert_eq!(&text[node.start..node.end], node.text, "offsets must address the source");
            assert!(!node.text.trim().is_empty());
            assert!(node.text.chars().count() <= chunker.capacities[node.tier]);

            if node.is_leaf() && node.tier + 1 < chunker.capacities.len() {
                assert!(node.text.chars().count() <= chunker.capacities[node.tier + 1]);
            }

            match &node.parent_id {
                None => assert_eq!(node.tier, 0),
                Some(parent_id) => {
                    let parent = hierarchy.get(parent_id).unwrap();
                    assert_eq!(parent.tier + 1, node.tier);
                    assert!(parent.child_ids.contains(&node.id));
                }
            }

            let children = hierarchy.children_of(&node.id);
            let mut cursor = node.start;
            for child in children {
                assert!(child.start >= cursor, "children must be ordered and disjoint");
                assert!(text[cursor..child.start].trim().is_empty(), "gaps must be whitespace");
                cursor = child.end;
            }
            if !node.is_leaf() {
                assert!(text[cursor..node.end].trim().is_empty());
            }
        }
    }

    #[test]
    fn test_short_document_is_single_node() {
        let text = "A fifty character document about auto merging ok.";
        assert_eq!(text.len(), 50);

        let hierarchy = HierarchicalChunker::new(ChunkingConfig::default())
            .unwrap()
            .chunk(text);

        assert_eq!(hierarchy.len(), 1);
        let node = &hierarchy.nodes()[0];
        assert!(node.is_root() && node.is_leaf());
        assert_eq!(node.text, text);
        assert_eq!(hierarchy.leaves().len(), 1);
    }

    #[test]
    fn test_blank_text_is_empty_hierarchy() {
        let chunker = HierarchicalChunker::new(ChunkingConfig::default()).unwrap();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk(" \n\t ").is_empty());
    }

    #[test]
    fn test_invalid_tiers_rejected() {
        for sizes in [vec![], vec![128, 512], vec![64, 0]] {
            let config = ChunkingConfig {
                tier_sizes: sizes,
                size_unit: SizeUnit::Characters,
            };
            assert!(HierarchicalChunker::new(config).is_err());
        }
    }

    #[test]
    fn test_long_document_builds_full_depth() {
        let text: String = (0..60)
            .map(|i| {
                let sep = if i % 5 == 4 { "\n\n" } else { " " };
                format!("Sentence number {} talks about hierarchical retrieval.{}", i, sep)
            })
            .collect();
        let chunker = chunker(&[400, 120, 40]);
        let hierarchy = chunker.chunk(&text);

        assert!(hierarchy.roots().len() > 1, "long documents form a forest");
        assert_eq!(hierarchy.depth(), 3);
        assert!(hierarchy.leaves().iter().any(|l| l.tier == 2));
        assert_well_formed(&text, &chunker, &hierarchy);
    }

    #[test]
    fn test_random_documents_round_trip() {
        for seed in 0..40 {
            let text = random_document(seed);
            for sizes in [&[300usize, 80, 20][..], &[500, 60][..], &[90][..]] {
                let chunker = chunker(sizes);
                let hierarchy = chunker.chunk(&text);
                assert!(!hierarchy.is_empty());
                assert_well_formed(&text, &chunker, &hierarchy);
            }
        }
    }

    #[test]
    fn test_leading_whitespace_offsets() {
        let text = "\n\n   Indented opening sentence.  ";
        let hierarchy = chunker(&[200, 50]).chunk(text);
        let node = &hierarchy.nodes()[0];
        assert_eq!(node.text, "Indented opening sentence.");
        assert_eq!(&text[node.start..node.end], node.text);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let text = random_document(99);
        let chunker = chunker(&[300, 80, 20]);
        let first = chunker.chunk(&text);
        let second = chunker.chunk(&text);

        let leaves = |h: &ChunkHierarchy| -> Vec<(ChunkId, usize, usize)> {
            h.leaves().iter().map(|l| (l.id.clone(), l.start, l.end)).collect()
        };
        assert_eq!(leaves(&first), leaves(&second));
        assert_eq!(first.nodes(), second.nodes());
    }

    #[test]
    fn test_from_index_config() {
        let config = ChunkingConfig::from(&IndexConfig::default());
        assert_eq!(config, ChunkingConfig::default());
    }
}
