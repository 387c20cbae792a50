//! Radial ring layout simulation and same-layer collision counting.
//!
//! Every layer sits on one ring. The full circle is split among the root's
//! children, then recursively among each node's children, proportionally to
//! the angle each subtree needs. A subtree needs, on its most crowded layer,
//! `count * (2 * max_size + padding) / radius` radians. Spacing always uses
//! the maximum node size, while the rendered size scales with importance,
//! so the reserved angle is never smaller than what a subtree occupies.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::{FRAC_PI_2, TAU};

use generational_arena::Index;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::arena::Hierarchy;
use crate::domain::entities::{NodeId, PositionedNode, RingConfig};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::subtree::SubtreeCache;

/// Lower bound for extent totals used as divisors.
pub const MIN_TOTAL_EXTENT: f64 = 1e-4;

/// Layout knobs that stay fixed across candidate configurations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    /// Extra arc length between neighbouring nodes, in pixels
    pub padding: f64,
    /// Overlap below this many pixels is not counted as a collision
    pub tolerance: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            padding: 2.0,
            tolerance: 0.5,
        }
    }
}

/// Two same-layer nodes whose circles overlap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collision {
    pub layer: usize,
    pub first: NodeId,
    pub second: NodeId,
    pub distance: f64,
    pub min_distance: f64,
    /// `distance - min_distance`, negative for every collision
    pub gap: f64,
    pub size1: f64,
    pub size2: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollisionReport {
    pub count: usize,
    pub details: Vec<Collision>,
}

/// Positions plus collisions of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub positions: Vec<PositionedNode>,
    pub collisions: CollisionReport,
}

/// Places a fixed hierarchy for arbitrary ring configurations.
///
/// Holds only shared references, so one simulator can evaluate many
/// candidate configurations, also from several threads.
pub struct LayoutSimulator<'a> {
    hierarchy: &'a Hierarchy,
    cache: &'a SubtreeCache,
    importance: &'a HashMap<NodeId, f64>,
    params: LayoutParams,
}

impl<'a> LayoutSimulator<'a> {
    pub fn new(
        hierarchy: &'a Hierarchy,
        cache: &'a SubtreeCache,
        importance: &'a HashMap<NodeId, f64>,
        params: LayoutParams,
    ) -> Self {
        Self {
            hierarchy,
            cache,
            importance,
            params,
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        self.hierarchy
    }

    pub fn params(&self) -> LayoutParams {
        self.params
    }

    /// Importance of a node, 0 when unknown.
    pub fn importance_of(&self, id: &NodeId) -> f64 {
        self.importance.get(id).copied().unwrap_or(0.0)
    }

    /// Angle reserved for the subtree rooted at `idx`: the maximum over
    /// layers with a positive ring radius; 0 when no layer qualifies.
    pub fn required_extent(&self, idx: Index, rings: &[RingConfig]) -> f64 {
        self.cache
            .counts(idx)
            .iter()
            .zip(rings)
            .filter(|(&count, ring)| count > 0 && ring.radius > 0.0)
            .map(|(&count, ring)| count as f64 * ring.node_spacing(self.params.padding) / ring.radius)
            .fold(0.0, f64::max)
    }

    /// Depth-first, order-preserving placement of every node.
    ///
    /// The root sits at the origin and owns the full circle starting at
    /// 12 o'clock (`-π/2`); angles increase in child input order.
    #[instrument(level = "trace", skip_all)]
    pub fn place(&self, rings: &[RingConfig]) -> DomainResult<Vec<PositionedNode>> {
        if rings.len() < self.hierarchy.layer_count() {
            return Err(DomainError::MissingRing(rings.len()));
        }
        let Some(root) = self.hierarchy.root() else {
            return Ok(Vec::new());
        };

        let mut positioned = Vec::with_capacity(self.hierarchy.len());
        let mut stack: Vec<(Index, f64, f64)> = vec![(root, -FRAC_PI_2, TAU)];

        while let Some((idx, start, extent)) = stack.pop() {
            let Some(node) = self.hierarchy.get_node(idx) else {
                continue;
            };
            let ring = &rings[node.data.layer];
            let importance = self.importance_of(&node.data.id);
            let (x, y) = if node.parent.is_none() {
                (0.0, 0.0)
            } else {
                let center = start + extent / 2.0;
                (ring.radius * center.cos(), ring.radius * center.sin())
            };
            positioned.push(PositionedNode {
                id: node.data.id.clone(),
                layer: node.data.layer,
                x,
                y,
                size: ring.node_size(importance),
                importance,
            });

            if node.children.is_empty() {
                continue;
            }
            let extents: Vec<f64> = node
                .children
                .iter()
                .map(|&child| self.required_extent(child, rings))
                .collect();
            let scale = extent / extents.iter().sum::<f64>().max(MIN_TOTAL_EXTENT);

            let mut slices = Vec::with_capacity(extents.len());
            let mut child_start = start;
            for (&child, child_extent) in node.children.iter().zip(&extents) {
                let slice = child_extent * scale;
                slices.push((child, child_start, slice));
                child_start += slice;
            }
            // Reverse so the first child is popped next
            stack.extend(slices.into_iter().rev());
        }

        Ok(positioned)
    }

    /// Place all nodes and count collisions.
    pub fn simulate(&self, rings: &[RingConfig]) -> DomainResult<Simulation> {
        let positions = self.place(rings)?;
        let collisions = count_collisions(&positions, self.params.tolerance);
        debug!(
            "simulated {} nodes: {} collisions",
            positions.len(),
            collisions.count
        );
        Ok(Simulation {
            positions,
            collisions,
        })
    }
}

/// Count overlapping pairs within each layer.
///
/// A pair collides when its center distance is below `size1 + size2 - tolerance`.
/// Every unordered pair is considered once, nodes are never paired with
/// themselves, and different layers are never compared.
pub fn count_collisions(positions: &[PositionedNode], tolerance: f64) -> CollisionReport {
    let mut by_layer: BTreeMap<usize, Vec<&PositionedNode>> = BTreeMap::new();
    for node in positions {
        by_layer.entry(node.layer).or_default().push(node);
    }

    let mut report = CollisionReport::default();
    for (layer, nodes) in by_layer {
        for (a, b) in nodes.iter().tuple_combinations() {
            let distance = (a.x - b.x).hypot(a.y - b.y);
            let min_distance = a.size + b.size - tolerance;
            if distance < min_distance {
                report.details.push(Collision {
                    layer,
                    first: a.id.clone(),
                    second: b.id.clone(),
                    distance,
                    min_distance,
                    gap: distance - min_distance,
                    size1: a.size,
                    size2: b.size,
                });
            }
        }
    }
    report.count = report.details.len();
    report
}
