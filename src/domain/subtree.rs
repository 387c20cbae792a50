//! Per-node descendant counts by layer.

use std::collections::HashMap;

use generational_arena::Index;
use tracing::{debug, instrument};

use crate::domain::arena::Hierarchy;

/// For every node: how many nodes of its subtree (itself included) sit on each layer.
///
/// Purely structural. Built once per hierarchy with a post-order pass,
/// so each child's counts are final before they are folded into the parent,
/// then shared by every layout simulation run.
#[derive(Debug, Clone)]
pub struct SubtreeCache {
    counts: HashMap<Index, Vec<usize>>,
    layer_count: usize,
}

impl SubtreeCache {
    #[instrument(level = "debug", skip_all, fields(nodes = hierarchy.len()))]
    pub fn build(hierarchy: &Hierarchy) -> Self {
        let layer_count = hierarchy.layer_count();
        let mut counts: HashMap<Index, Vec<usize>> = HashMap::with_capacity(hierarchy.len());

        for (idx, node) in hierarchy.iter_postorder() {
            let mut own = vec![0; layer_count];
            own[node.data.layer] = 1;
            for child in &node.children {
                if let Some(child_counts) = counts.get(child) {
                    for (total, count) in own.iter_mut().zip(child_counts) {
                        *total += count;
                    }
                }
            }
            counts.insert(idx, own);
        }

        debug!("subtree cache: {} entries", counts.len());
        Self {
            counts,
            layer_count,
        }
    }

    /// Counts indexed by layer; empty for indices outside the hierarchy.
    pub fn counts(&self, idx: Index) -> &[usize] {
        self.counts.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
