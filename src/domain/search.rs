//! Sweep of ring-spacing candidates for the most compact collision-free layout.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::entities::{RingConfig, SizeRange};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::layout::LayoutSimulator;

/// One candidate: a radius for every layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// Ring gap this schedule was generated from, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
    pub radii: Vec<f64>,
}

impl Candidate {
    /// Equally spaced rings: `radius = layer * gap`.
    pub fn equal_spacing(gap: f64, layers: usize) -> Self {
        Self {
            gap: Some(gap),
            radii: (0..layers).map(|layer| layer as f64 * gap).collect(),
        }
    }

    /// An explicit per-layer radius schedule.
    pub fn schedule(radii: Vec<f64>) -> Self {
        Self { gap: None, radii }
    }

    /// Combine radii with the per-layer size ranges.
    ///
    /// Fails when either list does not cover `layers` layers.
    pub fn rings(&self, sizes: &[SizeRange], layers: usize) -> DomainResult<Vec<RingConfig>> {
        (0..layers)
            .map(|layer| match (self.radii.get(layer), sizes.get(layer)) {
                (Some(&radius), Some(&range)) => Ok(RingConfig::new(radius, range)),
                _ => Err(DomainError::MissingRing(layer)),
            })
            .collect()
    }

    pub fn label(&self) -> String {
        match self.gap {
            Some(gap) => format!("gap={gap}px"),
            None => format!(
                "radii=[{}]",
                self.radii
                    .iter()
                    .map(|r| format!("{r}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// Metrics of one evaluated candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    pub candidate: Candidate,
    pub rings: Vec<RingConfig>,
    pub collisions: usize,
    pub max_radius: f64,
    pub avg_actual_size: f64,
}

/// Ranked results and the selected configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Ascending by `(collisions, max_radius)`
    pub ranked: Vec<CandidateResult>,
    /// Position of the selection in `ranked`
    pub selected: usize,
    /// False when the selection is only the least-colliding compromise
    pub collision_free: bool,
}

impl SearchOutcome {
    pub fn best(&self) -> &CandidateResult {
        &self.ranked[self.selected]
    }
}

/// Evaluate every candidate and rank them.
///
/// Candidates are independent and evaluated in parallel; the final stable
/// sort makes the ranking identical to a sequential run.
#[instrument(level = "debug", skip_all, fields(candidates = candidates.len()))]
pub fn search(
    simulator: &LayoutSimulator<'_>,
    candidates: &[Candidate],
    sizes: &[SizeRange],
) -> DomainResult<SearchOutcome> {
    if candidates.is_empty() {
        return Err(DomainError::NoCandidates);
    }

    let results: Vec<DomainResult<CandidateResult>> = candidates
        .par_iter()
        .map(|candidate| evaluate(simulator, candidate, sizes))
        .collect();

    // Collect successes, propagate first error
    let mut ranked = Vec::with_capacity(results.len());
    for result in results {
        ranked.push(result?);
    }
    ranked.sort_by(|a, b| {
        a.collisions
            .cmp(&b.collisions)
            .then(a.max_radius.total_cmp(&b.max_radius))
    });

    // After sorting, the first entry is either the smallest zero-collision
    // configuration or the least-colliding one.
    let collision_free = ranked[0].collisions == 0;
    if collision_free {
        info!("smallest collision-free: {}", ranked[0].candidate.label());
    } else {
        info!(
            "no collision-free configuration, best has {} collisions",
            ranked[0].collisions
        );
    }

    Ok(SearchOutcome {
        ranked,
        selected: 0,
        collision_free,
    })
}

/// Simulate one candidate.
pub fn evaluate(
    simulator: &LayoutSimulator<'_>,
    candidate: &Candidate,
    sizes: &[SizeRange],
) -> DomainResult<CandidateResult> {
    let hierarchy = simulator.hierarchy();
    let rings = candidate.rings(sizes, hierarchy.layer_count())?;
    let simulation = simulator.simulate(&rings)?;

    let max_radius = rings.iter().map(|ring| ring.radius).fold(0.0, f64::max);

    let (total_size, count) = hierarchy
        .nodes()
        .filter_map(|(_, node)| {
            rings
                .get(node.data.layer)
                .map(|ring| ring.node_size(simulator.importance_of(&node.data.id)))
        })
        .fold((0.0, 0usize), |(total, count), size| (total + size, count + 1));
    let avg_actual_size = if count > 0 {
        total_size / count as f64
    } else {
        0.0
    };

    debug!(
        "{}: collisions={} max_radius={} avg_size={:.2}",
        candidate.label(),
        simulation.collisions.count,
        max_radius,
        avg_actual_size
    );
    Ok(CandidateResult {
        candidate: candidate.clone(),
        rings,
        collisions: simulation.collisions.count,
        max_radius,
        avg_actual_size,
    })
}
