//! Distribution statistics and rankings for importance reports.

use serde::Serialize;

use crate::domain::arena::Hierarchy;
use crate::domain::entities::{BoostFactor, NodeId};
use crate::domain::importance::ImportanceMap;

/// Summary statistics over all normalized values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistributionStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    pub p95: f64,
}

impl DistributionStats {
    /// Percentiles take the element at `floor(q * n)` of the sorted values;
    /// the median averages the two middle elements for even `n`.
    ///
    /// Returns None for an empty input.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut sorted: Vec<f64> = values.into_iter().collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let at = |index: usize| sorted[index.min(n - 1)];
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        Some(Self {
            min: sorted[0],
            max: sorted[n - 1],
            mean: sorted.iter().sum::<f64>() / n as f64,
            median,
            p25: at(n / 4),
            p75: at(3 * n / 4),
            p95: at((0.95 * n as f64) as usize),
        })
    }

    /// Copy with every field rounded to `decimals` places.
    pub fn rounded(&self, decimals: i32) -> Self {
        Self {
            min: round_to(self.min, decimals),
            max: round_to(self.max, decimals),
            mean: round_to(self.mean, decimals),
            median: round_to(self.median, decimals),
            p25: round_to(self.p25, decimals),
            p75: round_to(self.p75, decimals),
            p95: round_to(self.p95, decimals),
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// How many nodes ended up with a strictly positive importance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coverage {
    pub total_nodes: usize,
    pub nodes_with_importance: usize,
    /// Percentage rounded to one decimal
    pub coverage_percentage: f64,
}

impl Coverage {
    pub fn compute(hierarchy: &Hierarchy, importance: &ImportanceMap) -> Self {
        let total_nodes = hierarchy.len();
        let nodes_with_importance = hierarchy
            .nodes()
            .filter(|(_, node)| importance.normalized(node.data.id.as_str()) > 0.0)
            .count();
        let coverage_percentage = if total_nodes == 0 {
            0.0
        } else {
            round_to(100.0 * nodes_with_importance as f64 / total_nodes as f64, 1)
        };
        Self {
            total_nodes,
            nodes_with_importance,
            coverage_percentage,
        }
    }
}

/// One row of a ranking table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedNode {
    pub rank: usize,
    pub id: NodeId,
    pub label: String,
    pub raw: f64,
    pub normalized: f64,
    pub floor_adjusted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost_factor: Option<BoostFactor>,
}

/// Nodes of `layer` by descending normalized importance.
///
/// The sort is stable, so ties keep input order. `limit` truncates the table.
pub fn rank_layer(
    hierarchy: &Hierarchy,
    importance: &ImportanceMap,
    layer: usize,
    limit: Option<usize>,
) -> Vec<RankedNode> {
    let mut rows: Vec<RankedNode> = hierarchy
        .layer_nodes(layer)
        .map(|node| {
            let id = node.data.id.as_str();
            RankedNode {
                rank: 0,
                id: node.data.id.clone(),
                label: node.data.label.clone(),
                raw: importance.raw(id),
                normalized: importance.normalized(id),
                floor_adjusted: importance.is_floor_adjusted(id),
                boost_factor: importance.boost(id),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.normalized.total_cmp(&a.normalized));
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    for (position, row) in rows.iter_mut().enumerate() {
        row.rank = position + 1;
    }
    rows
}

/// Display key per row: the label, or `label [id]` when an earlier row
/// already uses that label.
pub fn ranking_keys(ranked: &[RankedNode]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(ranked.len());
    for row in ranked {
        let key = if keys.contains(&row.label) {
            format!("{} [{}]", row.label, row.id)
        } else {
            row.label.clone()
        };
        keys.push(key);
    }
    keys
}

/// Human-readable warnings for outcomes boosted by more than `threshold`.
///
/// Rows are named by [`ranking_keys`].
pub fn boost_warnings(ranked: &[RankedNode], threshold: f64, floor_percentage: f64) -> Vec<String> {
    let percent = round_to(floor_percentage * 100.0, 0);
    ranked
        .iter()
        .zip(ranking_keys(ranked))
        .filter_map(|(row, key)| row.boost_factor.map(|boost| (key, boost)))
        .filter(|(_, boost)| boost.exceeds(threshold))
        .map(|(key, boost)| format!("{} boosted {} to meet {}% floor", key, boost, percent))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_ten_values_when_computing_stats_then_uses_index_percentiles() {
        let values: Vec<f64> = (0..10).map(|v| v as f64 / 10.0).collect();

        let stats = DistributionStats::from_values(values).unwrap();

        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 0.9);
        assert_eq!(stats.p25, 0.2);
        assert_eq!(stats.p75, 0.7);
        assert_eq!(stats.p95, 0.9);
        assert!((stats.median - 0.45).abs() < 1e-12);
        assert!((stats.mean - 0.45).abs() < 1e-12);
    }

    #[test]
    fn given_no_values_when_computing_stats_then_none() {
        assert!(DistributionStats::from_values(Vec::new()).is_none());
    }

    #[test]
    fn given_value_when_rounding_then_keeps_requested_decimals() {
        assert_eq!(round_to(0.1234567, 6), 0.123457);
        assert_eq!(round_to(66.66666, 1), 66.7);
    }

    fn row(id: &str, label: &str, boost: Option<BoostFactor>) -> RankedNode {
        RankedNode {
            rank: 0,
            id: NodeId::new(id).unwrap(),
            label: label.to_string(),
            raw: 0.0,
            normalized: 0.5,
            floor_adjusted: boost.is_some(),
            boost_factor: boost,
        }
    }

    #[test]
    fn given_repeated_labels_when_warning_then_names_match_ranking_keys() {
        let ranked = vec![
            row("o1", "Mortality", None),
            row("o2", "Mortality", Some(BoostFactor::Ratio(20.0))),
            row("o3", "Mortality", Some(BoostFactor::FromZero)),
            row("o4", "Income", Some(BoostFactor::Ratio(2.0))),
        ];

        let keys = ranking_keys(&ranked);
        let warnings = boost_warnings(&ranked, 10.0, 0.5);

        assert_eq!(
            keys,
            vec!["Mortality", "Mortality [o2]", "Mortality [o3]", "Income"]
        );
        assert_eq!(
            warnings,
            vec![
                "Mortality [o2] boosted 20x to meet 50% floor".to_string(),
                "Mortality [o3] boosted from zero to meet 50% floor".to_string(),
            ]
        );
    }
}
