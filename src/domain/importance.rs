//! Hierarchical importance: leaf scores summed bottom-up, globally
//! normalized, optionally floor-boosted on one layer.

use std::collections::HashMap;

use tracing::{debug, info, instrument, warn};

use crate::domain::arena::Hierarchy;
use crate::domain::entities::{BoostFactor, NodeId};

/// Result of looking up one leaf in a score source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeafScore {
    Present(f64),
    /// No record for this leaf
    Missing,
    /// A record exists but its score is unusable (non-numeric, negative, non-finite)
    Invalid,
}

/// External per-leaf raw scores, keyed by node id.
pub trait ScoreSource {
    fn leaf_score(&self, id: &NodeId) -> LeafScore;
}

impl ScoreSource for HashMap<NodeId, f64> {
    fn leaf_score(&self, id: &NodeId) -> LeafScore {
        match self.get(id) {
            Some(value) if value.is_finite() && *value >= 0.0 => LeafScore::Present(*value),
            Some(_) => LeafScore::Invalid,
            None => LeafScore::Missing,
        }
    }
}

/// Post-normalization floor applied to one layer (the outcomes by default).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorPolicy {
    pub layer: usize,
    /// Fraction of the layer's maximum that every node is raised to
    pub percentage: f64,
}

impl Default for FloorPolicy {
    fn default() -> Self {
        Self {
            layer: 1,
            percentage: 0.5,
        }
    }
}

/// Per-layer aggregate after the bottom-up pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
    pub layer: usize,
    pub count: usize,
    pub sum: f64,
    pub max: f64,
}

/// Counters collected while assigning leaf scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationDiagnostics {
    pub leaves_scored: usize,
    pub leaves_missing: usize,
    pub leaves_invalid: usize,
    pub layers: Vec<LayerSummary>,
}

/// What the floor policy did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorOutcome {
    pub policy: FloorPolicy,
    /// Largest normalized value on the floored layer before boosting
    pub max_value: f64,
    pub floor_value: f64,
    pub boosted: usize,
    /// Set when the layer was empty or all-zero and nothing could be boosted
    pub skipped: bool,
}

/// Raw and normalized importance for every node of one hierarchy.
///
/// Kept separate from the hierarchy itself; a merge step writes the
/// values back into the output document.
#[derive(Debug, Clone)]
pub struct ImportanceMap {
    raw: HashMap<NodeId, f64>,
    normalized: HashMap<NodeId, f64>,
    boosts: HashMap<NodeId, BoostFactor>,
    max_raw: f64,
    floor: Option<FloorOutcome>,
    diagnostics: AggregationDiagnostics,
}

impl ImportanceMap {
    /// Aggregate and normalize; no floor is applied.
    #[instrument(level = "debug", skip_all, fields(nodes = hierarchy.len()))]
    pub fn compute(hierarchy: &Hierarchy, scores: &dyn ScoreSource) -> Self {
        let (raw, diagnostics) = aggregate_raw(hierarchy, scores);
        let (normalized, max_raw) = normalize(&raw);
        Self {
            raw,
            normalized,
            boosts: HashMap::new(),
            max_raw,
            floor: None,
            diagnostics,
        }
    }

    /// Aggregate, normalize and, when a policy is given, apply the floor.
    pub fn compute_with_floor(
        hierarchy: &Hierarchy,
        scores: &dyn ScoreSource,
        floor: Option<FloorPolicy>,
    ) -> Self {
        let mut map = Self::compute(hierarchy, scores);
        if let Some(policy) = floor {
            map.apply_floor(hierarchy, policy);
        }
        map
    }

    /// Raise every node of `policy.layer` to at least
    /// `policy.percentage * max(layer)`.
    ///
    /// Only the normalized values of that layer change. No renormalization
    /// follows, the floor never exceeds the layer maximum so values stay in [0, 1].
    #[instrument(level = "debug", skip(self, hierarchy))]
    pub fn apply_floor(&mut self, hierarchy: &Hierarchy, policy: FloorPolicy) -> FloorOutcome {
        let ids: Vec<&NodeId> = hierarchy
            .layer_nodes(policy.layer)
            .map(|node| &node.data.id)
            .collect();

        let max_value = ids
            .iter()
            .map(|id| self.normalized(id.as_str()))
            .fold(0.0_f64, f64::max);
        let floor_value = policy.percentage * max_value;
        let mut outcome = FloorOutcome {
            policy,
            max_value,
            floor_value,
            boosted: 0,
            skipped: false,
        };

        if ids.is_empty() || max_value <= 0.0 || floor_value <= 0.0 {
            debug!("floor skipped: layer={} max={}", policy.layer, max_value);
            outcome.skipped = true;
            self.floor = Some(outcome);
            return outcome;
        }

        for id in ids {
            let value = self.normalized(id.as_str());
            let boost = if value == 0.0 {
                BoostFactor::FromZero
            } else if value < floor_value {
                BoostFactor::Ratio(floor_value / value)
            } else {
                continue;
            };
            debug!("boosting {}: {:.4} -> {:.4} ({})", id, value, floor_value, boost);
            self.normalized.insert(id.clone(), floor_value);
            self.boosts.insert(id.clone(), boost);
            outcome.boosted += 1;
        }

        self.floor = Some(outcome);
        outcome
    }

    pub fn raw(&self, id: &str) -> f64 {
        self.raw.get(id).copied().unwrap_or(0.0)
    }

    pub fn normalized(&self, id: &str) -> f64 {
        self.normalized.get(id).copied().unwrap_or(0.0)
    }

    pub fn has_entry(&self, id: &str) -> bool {
        self.normalized.contains_key(id)
    }

    pub fn boost(&self, id: &str) -> Option<BoostFactor> {
        self.boosts.get(id).copied()
    }

    pub fn is_floor_adjusted(&self, id: &str) -> bool {
        self.boosts.contains_key(id)
    }

    pub fn boosted_count(&self) -> usize {
        self.boosts.len()
    }

    /// Global maximum raw value used as the normalization divisor.
    pub fn max_raw(&self) -> f64 {
        self.max_raw
    }

    /// All raw values are zero, so every normalized value is zero as well.
    pub fn is_degenerate(&self) -> bool {
        self.max_raw <= 0.0
    }

    pub fn floor(&self) -> Option<&FloorOutcome> {
        self.floor.as_ref()
    }

    pub fn diagnostics(&self) -> &AggregationDiagnostics {
        &self.diagnostics
    }

    pub fn normalized_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.normalized.values().copied()
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// Assign leaf scores, then sum children into parents layer by layer.
///
/// Layers are processed strictly from `L - 1` down to `0`, so every child
/// value is final before its parent is summed.
fn aggregate_raw(
    hierarchy: &Hierarchy,
    scores: &dyn ScoreSource,
) -> (HashMap<NodeId, f64>, AggregationDiagnostics) {
    let mut raw: HashMap<NodeId, f64> = HashMap::with_capacity(hierarchy.len());
    let mut diagnostics = AggregationDiagnostics::default();
    let leaf_layer = hierarchy.max_layer();

    for node in hierarchy.layer_nodes(leaf_layer) {
        let value = match scores.leaf_score(&node.data.id) {
            LeafScore::Present(value) => {
                diagnostics.leaves_scored += 1;
                value
            }
            LeafScore::Missing => {
                diagnostics.leaves_missing += 1;
                0.0
            }
            LeafScore::Invalid => {
                warn!("unusable score for leaf {}, using 0", node.data.id);
                diagnostics.leaves_invalid += 1;
                0.0
            }
        };
        raw.insert(node.data.id.clone(), value);
    }
    info!(
        "L{}: {} with score, {} missing, {} invalid",
        leaf_layer,
        diagnostics.leaves_scored,
        diagnostics.leaves_missing,
        diagnostics.leaves_invalid
    );
    diagnostics
        .layers
        .push(summarize_layer(hierarchy, &raw, leaf_layer));

    for layer in (0..leaf_layer).rev() {
        for &idx in hierarchy.layer(layer) {
            let Some(node) = hierarchy.get_node(idx) else {
                continue;
            };
            let value = if node.children.is_empty() {
                raw.get(&node.data.id).copied().unwrap_or(0.0)
            } else {
                node.children
                    .iter()
                    .filter_map(|&child| hierarchy.get_node(child))
                    .map(|child| raw.get(&child.data.id).copied().unwrap_or(0.0))
                    .sum()
            };
            raw.insert(node.data.id.clone(), value);
        }

        let summary = summarize_layer(hierarchy, &raw, layer);
        if summary.count > 0 {
            info!(
                "L{}: count={}, sum={:.4}, max={:.4}",
                layer, summary.count, summary.sum, summary.max
            );
        }
        diagnostics.layers.push(summary);
    }

    (raw, diagnostics)
}

fn summarize_layer(hierarchy: &Hierarchy, raw: &HashMap<NodeId, f64>, layer: usize) -> LayerSummary {
    let values: Vec<f64> = hierarchy
        .layer_nodes(layer)
        .map(|node| raw.get(&node.data.id).copied().unwrap_or(0.0))
        .collect();
    LayerSummary {
        layer,
        count: values.len(),
        sum: values.iter().sum(),
        max: values.iter().copied().fold(0.0, f64::max),
    }
}

/// Divide every value by the single global maximum.
fn normalize(raw: &HashMap<NodeId, f64>) -> (HashMap<NodeId, f64>, f64) {
    let max_raw = raw.values().copied().fold(0.0_f64, f64::max);
    if max_raw <= 0.0 {
        warn!("global max raw importance is zero, all normalized values are 0");
    } else {
        debug!("global max raw importance: {:.4}", max_raw);
    }

    let normalized = raw
        .iter()
        .map(|(id, &value)| {
            let value = if max_raw > 0.0 { value / max_raw } else { 0.0 };
            (id.clone(), value)
        })
        .collect();
    (normalized, max_raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HierarchyBuilder, NodeRecord};

    fn record(id: &str, layer: usize, parent: Option<&str>) -> NodeRecord {
        NodeRecord {
            id: NodeId::new(id).unwrap(),
            layer,
            parent: parent.map(|p| NodeId::new(p).unwrap()),
            label: id.to_string(),
        }
    }

    fn scores(pairs: &[(&str, f64)]) -> HashMap<NodeId, f64> {
        pairs
            .iter()
            .map(|(id, value)| (NodeId::new(*id).unwrap(), *value))
            .collect()
    }

    #[test]
    fn given_three_leaves_when_computing_then_parent_is_sum_and_max_is_one() {
        let hierarchy = HierarchyBuilder::new()
            .node(record("root", 0, None))
            .node(record("a", 1, Some("root")))
            .node(record("b", 1, Some("root")))
            .node(record("c", 1, Some("root")))
            .build()
            .unwrap();

        let map = ImportanceMap::compute(&hierarchy, &scores(&[("a", 2.0), ("b", 4.0), ("c", 6.0)]));

        assert_eq!(map.raw("root"), 12.0);
        assert_eq!(map.normalized("root"), 1.0);
        assert_eq!(map.normalized("a"), 2.0 / 12.0);
        assert_eq!(map.normalized("b"), 4.0 / 12.0);
        assert_eq!(map.normalized("c"), 6.0 / 12.0);
    }

    #[test]
    fn given_negative_score_when_computing_then_counted_invalid_and_zeroed() {
        let hierarchy = HierarchyBuilder::new()
            .node(record("root", 0, None))
            .node(record("a", 1, Some("root")))
            .node(record("b", 1, Some("root")))
            .build()
            .unwrap();

        let map = ImportanceMap::compute(&hierarchy, &scores(&[("a", -1.0)]));

        assert_eq!(map.diagnostics().leaves_invalid, 1);
        assert_eq!(map.diagnostics().leaves_missing, 1);
        assert!(map.is_degenerate());
        assert_eq!(map.normalized("a"), 0.0);
    }

    #[test]
    fn given_empty_floor_layer_when_applying_floor_then_skips() {
        let hierarchy = HierarchyBuilder::new()
            .node(record("root", 0, None))
            .build()
            .unwrap();
        let mut map = ImportanceMap::compute(&hierarchy, &scores(&[("root", 1.0)]));

        let outcome = map.apply_floor(&hierarchy, FloorPolicy::default());

        assert!(outcome.skipped);
        assert_eq!(map.boosted_count(), 0);
        // root is the leaf layer of a single-node hierarchy
        assert_eq!(map.normalized("root"), 1.0);
    }
}
