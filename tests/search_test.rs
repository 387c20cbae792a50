//! Tests for the ring-spacing parameter search

use std::collections::HashMap;

use rstest::{fixture, rstest};

use ringscore::domain::{
    search, Candidate, DomainError, Hierarchy, HierarchyBuilder, LayoutParams, LayoutSimulator,
    NodeId, NodeRecord, SizeRange, SubtreeCache,
};

const OUTCOMES: usize = 20;

/// Root with 20 outcomes of full importance (radius 18 each).
///
/// Outcomes are spread evenly, neighbours sit `2 r sin(pi / 20)` apart and
/// collide below `18 + 18 - 0.5`: at r = 100 (31.3) but not at r = 150 (46.9).
#[fixture]
fn crowded_ring() -> (Hierarchy, HashMap<NodeId, f64>) {
    let mut records = vec![NodeRecord {
        id: NodeId::new("root").unwrap(),
        layer: 0,
        parent: None,
        label: "root".into(),
    }];
    for i in 0..OUTCOMES {
        records.push(NodeRecord {
            id: NodeId::new(format!("o{i}")).unwrap(),
            layer: 1,
            parent: Some(NodeId::new("root").unwrap()),
            label: format!("Outcome {i}"),
        });
    }
    let hierarchy = HierarchyBuilder::new().nodes(records).build().unwrap();
    let importance = hierarchy
        .nodes()
        .map(|(_, node)| (node.data.id.clone(), 1.0))
        .collect();
    (hierarchy, importance)
}

fn sizes() -> Vec<SizeRange> {
    vec![SizeRange::new(12.0, 12.0), SizeRange::new(3.0, 18.0)]
}

fn candidates(gaps: &[f64]) -> Vec<Candidate> {
    gaps.iter()
        .map(|&gap| Candidate::equal_spacing(gap, 2))
        .collect()
}

#[rstest]
fn given_sweep_when_smallest_gap_collides_then_next_clean_gap_selected(
    crowded_ring: (Hierarchy, HashMap<NodeId, f64>),
) {
    let (hierarchy, importance) = crowded_ring;
    let cache = SubtreeCache::build(&hierarchy);
    let simulator = LayoutSimulator::new(&hierarchy, &cache, &importance, LayoutParams::default());

    let outcome = search(&simulator, &candidates(&[100.0, 150.0, 200.0]), &sizes()).unwrap();

    assert!(outcome.collision_free);
    assert_eq!(outcome.best().candidate.gap, Some(150.0));
    assert_eq!(outcome.best().max_radius, 150.0);
    let order: Vec<(Option<f64>, usize)> = outcome
        .ranked
        .iter()
        .map(|result| (result.candidate.gap, result.collisions))
        .collect();
    assert_eq!(
        order,
        vec![(Some(150.0), 0), (Some(200.0), 0), (Some(100.0), OUTCOMES)]
    );
    // every node at full importance: root 12, outcomes 18
    let expected_avg = (12.0 + 18.0 * OUTCOMES as f64) / (OUTCOMES + 1) as f64;
    assert!((outcome.best().avg_actual_size - expected_avg).abs() < 1e-9);
}

#[rstest]
fn given_only_colliding_candidates_when_searching_then_least_colliding_compromise(
    crowded_ring: (Hierarchy, HashMap<NodeId, f64>),
) {
    let (hierarchy, importance) = crowded_ring;
    let cache = SubtreeCache::build(&hierarchy);
    let simulator = LayoutSimulator::new(&hierarchy, &cache, &importance, LayoutParams::default());

    // r = 50 also overlaps second neighbours (30.9 apart)
    let outcome = search(&simulator, &candidates(&[50.0, 80.0]), &sizes()).unwrap();

    assert!(!outcome.collision_free);
    assert_eq!(outcome.best().candidate.gap, Some(80.0));
    assert_eq!(outcome.best().collisions, OUTCOMES);
    assert_eq!(outcome.ranked[1].collisions, 2 * OUTCOMES);
}

#[rstest]
fn given_explicit_schedule_when_searching_then_ranked_with_gaps(
    crowded_ring: (Hierarchy, HashMap<NodeId, f64>),
) {
    let (hierarchy, importance) = crowded_ring;
    let cache = SubtreeCache::build(&hierarchy);
    let simulator = LayoutSimulator::new(&hierarchy, &cache, &importance, LayoutParams::default());
    let mut all = candidates(&[100.0, 200.0]);
    all.push(Candidate::schedule(vec![0.0, 130.0]));

    let outcome = search(&simulator, &all, &sizes()).unwrap();

    assert_eq!(outcome.best().candidate.gap, None);
    assert_eq!(outcome.best().candidate.radii, vec![0.0, 130.0]);
    assert_eq!(outcome.best().candidate.label(), "radii=[0, 130]");
}

#[rstest]
fn given_same_candidates_when_searching_twice_then_identical(
    crowded_ring: (Hierarchy, HashMap<NodeId, f64>),
) {
    let (hierarchy, importance) = crowded_ring;
    let cache = SubtreeCache::build(&hierarchy);
    let simulator = LayoutSimulator::new(&hierarchy, &cache, &importance, LayoutParams::default());
    let gaps: Vec<f64> = (1..=12).map(|step| step as f64 * 25.0).collect();

    let first = search(&simulator, &candidates(&gaps), &sizes()).unwrap();
    let second = search(&simulator, &candidates(&gaps), &sizes()).unwrap();

    assert_eq!(first, second);
}

#[rstest]
fn given_no_candidates_when_searching_then_errors(
    crowded_ring: (Hierarchy, HashMap<NodeId, f64>),
) {
    let (hierarchy, importance) = crowded_ring;
    let cache = SubtreeCache::build(&hierarchy);
    let simulator = LayoutSimulator::new(&hierarchy, &cache, &importance, LayoutParams::default());

    let result = search(&simulator, &[], &sizes());

    assert_eq!(result, Err(DomainError::NoCandidates));
}
