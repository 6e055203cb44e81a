//! Auto-merging retrieval
//!
//! Retrieves leaves, then repeatedly replaces groups of retrieved siblings with
//! their parent when more than `merge_threshold` of the parent's children are
//! present. A merged parent scores the mean of the children it replaced and can
//! itself merge one tier up on the next pass.

use super::{into_retrieval_error, sort_by_score, Retriever, ScoredChunk};
use docchat_common::errors::Result;
use docchat_common::hierarchy::Chunk;
use docchat_common::metrics;
use docchat_common::storage::StorageContext;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Siblings of one parent present in the current result
struct MergeCandidate<'a> {
    parent: &'a Chunk,
    members: Vec<usize>,
}

/// Leaf retriever wrapped with parent merging
pub struct AutoMergingRetriever {
    leaf_retriever: Arc<dyn Retriever>,
    storage: Arc<StorageContext>,
    merge_threshold: f32,
    fill_gaps: bool,
}

impl AutoMergingRetriever {
    pub fn new(leaf_retriever: Arc<dyn Retriever>, storage: Arc<StorageContext>, merge_threshold: f32) -> Self {
        Self {
            leaf_retriever,
            storage,
            merge_threshold,
            fill_gaps: true,
        }
    }

    /// Toggle insertion of a single missing sibling between two retrieved ones
    pub fn with_gap_filling(mut self, fill_gaps: bool) -> Self {
        self.fill_gaps = fill_gaps;
        self
    }

    /// Parent ids in order of first appearance, each with the result positions of its children
    fn group_by_parent(nodes: &[ScoredChunk]) -> Vec<(&str, Vec<usize>)> {
        let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            let Some(parent_id) = node.chunk.parent_id.as_deref() else {
                continue;
            };
            match groups.iter_mut().find(|(p, _)| *p == parent_id) {
                Some((_, members)) => members.push(i),
                None => groups.push((parent_id, vec![i])),
            }
        }
        groups
    }

    /// Insert the missing middle sibling of `a _ b` patterns; returns how many were added
    fn fill_gaps_pass(&self, nodes: &mut Vec<ScoredChunk>) -> Result<usize> {
        let docstore = &self.storage.docstore;
        let present: HashMap<&str, (f32, usize)> = nodes
            .iter()
            .map(|n| (n.id(), (n.score, n.rank)))
            .collect();

        let mut inserts: Vec<ScoredChunk> = Vec::new();
        for (parent_id, _) in Self::group_by_parent(nodes) {
            let parent = docstore.get_node(parent_id)?;
            let positions: Vec<usize> = parent
                .child_ids
                .iter()
                .enumerate()
                .filter(|(_, id)| present.contains_key(id.as_str()))
                .map(|(i, _)| i)
                .collect();

            for pair in positions.windows(2) {
                if pair[1] - pair[0] != 2 {
                    continue;
                }
                let middle_id = &parent.child_ids[pair[0] + 1];
                // A result chunk below the missing sibling already covers part of it
                if nodes.iter().any(|n| docstore.is_ancestor(middle_id, n.id())) {
                    continue;
                }

                let (left_score, left_rank) = present[parent.child_ids[pair[0]].as_str()];
                let (right_score, right_rank) = present[parent.child_ids[pair[1]].as_str()];
                let score = (left_score + right_score) / 2.0;

                debug!(chunk = %middle_id, parent = %parent_id, score, "Filling gap between retrieved siblings");
                inserts.push(ScoredChunk {
                    chunk: docstore.get_node(middle_id)?.clone(),
                    score,
                    rank: left_rank.max(right_rank),
                });
            }
        }

        let added = inserts.len();
        nodes.extend(inserts);
        Ok(added)
    }

    /// One merge pass; returns the new result and the number of parents merged in
    fn merge_pass(&self, nodes: Vec<ScoredChunk>) -> Result<(Vec<ScoredChunk>, usize)> {
        let docstore = &self.storage.docstore;

        let mut candidates = Vec::new();
        for (parent_id, members) in Self::group_by_parent(&nodes) {
            let parent = docstore.get_node(parent_id)?;
            let total = parent.child_ids.len();
            if total == 0 {
                continue;
            }
            let ratio = members.len() as f32 / total as f32;
            if ratio > self.merge_threshold {
                candidates.push(MergeCandidate { parent, members });
            }
        }

        if candidates.is_empty() {
            return Ok((nodes, 0));
        }

        // Coarsest parents first so a deeper candidate under them is absorbed, not merged
        candidates.sort_by_key(|c| c.parent.tier);

        let mut removed = vec![false; nodes.len()];
        let mut merged: Vec<ScoredChunk> = Vec::new();

        for candidate in candidates {
            let parent = candidate.parent;
            if merged.iter().any(|m| docstore.is_ancestor(m.id(), &parent.id)) {
                continue;
            }

            let score = candidate.members.iter().map(|&i| nodes[i].score).sum::<f32>()
                / candidate.members.len() as f32;
            let rank = candidate
                .members
                .iter()
                .map(|&i| nodes[i].rank)
                .min()
                .unwrap_or(usize::MAX);

            for &i in &candidate.members {
                removed[i] = true;
            }
            for (i, node) in nodes.iter().enumerate() {
                if !removed[i] && docstore.is_ancestor(&parent.id, node.id()) {
                    removed[i] = true;
                }
            }

            debug!(
                parent = %parent.id,
                tier = parent.tier,
                children = candidate.members.len(),
                total_children = parent.child_ids.len(),
                score,
                "Merging children into parent"
            );

            merged.push(ScoredChunk {
                chunk: parent.clone(),
                score,
                rank,
            });
        }

        let merges = merged.len();
        let mut result: Vec<ScoredChunk> = nodes
            .into_iter()
            .zip(removed)
            .filter(|(_, gone)| !gone)
            .map(|(node, _)| node)
            .collect();
        result.extend(merged);

        Ok((result, merges))
    }

    /// Alternate gap filling and merging until neither changes the result
    fn merge_until_stable(&self, mut nodes: Vec<ScoredChunk>) -> Result<(Vec<ScoredChunk>, usize)> {
        let mut total_merges = 0;
        let mut pass = 0;

        loop {
            pass += 1;
            let filled = if self.fill_gaps {
                self.fill_gaps_pass(&mut nodes)?
            } else {
                0
            };

            let (next, merges) = self.merge_pass(nodes)?;
            nodes = next;
            total_merges += merges;

            if filled == 0 && merges == 0 {
                break;
            }

            debug!(pass, filled, merges, remaining = nodes.len(), "Merge pass complete");
        }

        sort_by_score(&mut nodes);
        Ok((nodes, total_merges))
    }
}

#[async_trait::async_trait]
impl Retriever for AutoMergingRetriever {
    #[instrument(skip(self, query), fields(retriever = "auto_merging"))]
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let started = Instant::now();

        let leaves = self.leaf_retriever.retrieve(query).await?;
        let initial = leaves.len();

        let (results, merges) = self.merge_until_stable(leaves).map_err(into_retrieval_error)?;

        metrics::record_retrieval(started.elapsed().as_secs_f64(), merges, results.len());
        info!(
            initial,
            merges,
            results = results.len(),
            "Auto-merging retrieval complete"
        );

        Ok(results)
    }

    fn name(&self) -> &'static str {
        "auto_merging"
    }
}

/// Whether any result chunk is a strict ancestor of another
pub fn has_overlap(storage: &StorageContext, results: &[ScoredChunk]) -> bool {
    let ids: HashSet<&str> = results.iter().map(|r| r.id()).collect();
    results.iter().any(|r| {
        ids.iter()
            .any(|other| *other != r.id() && storage.docstore.is_ancestor(other, r.id()))
    })
}
