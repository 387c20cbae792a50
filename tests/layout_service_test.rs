//! Tests for LayoutService

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use ringscore::application::services::LayoutService;
use ringscore::application::ApplicationError;
use ringscore::config::Settings;
use ringscore::domain::DomainError;
use ringscore::infrastructure::traits::RealFileSystem;
use ringscore::util::testing;

const OUTCOMES: usize = 20;

/// Root plus 20 outcomes at full importance, as written by the importance run.
fn write_tree(temp: &TempDir) -> PathBuf {
    let mut nodes = vec![json!({"id": 0, "layer": 0, "label": "root", "importance": 1.0})];
    nodes.extend((1..=OUTCOMES).map(|id| {
        json!({"id": id, "layer": 1, "parent": 0, "label": format!("Outcome {id}"), "importance": 1.0})
    }));
    let path = temp.path().join("tree.json");
    std::fs::write(&path, json!({ "nodes": nodes }).to_string()).unwrap();
    path
}

fn service(settings: Settings) -> LayoutService {
    LayoutService::new(Arc::new(RealFileSystem), Arc::new(settings))
}

#[test]
fn given_configured_gaps_when_searching_then_smallest_clean_gap_selected() {
    testing::init_test_setup();
    let temp = TempDir::new().unwrap();
    let tree = write_tree(&temp);

    let outcome = service(Settings::default()).search(&tree, None).unwrap();

    // neighbours sit 2 r sin(pi / 20) apart and need 35.5px: only 100 collides
    assert!(outcome.collision_free);
    assert_eq!(outcome.best().candidate.gap, Some(120.0));
    assert_eq!(outcome.ranked.len(), Settings::default().layout.gaps.len());
    assert_eq!(outcome.ranked.last().unwrap().candidate.gap, Some(100.0));
}

#[test]
fn given_cli_gaps_and_schedule_when_searching_then_both_ranked() {
    let temp = TempDir::new().unwrap();
    let tree = write_tree(&temp);
    let mut settings = Settings::default();
    settings.layout.schedules = vec![vec![0.0, 130.0]];

    let outcome = service(settings)
        .search(&tree, Some(&[100.0, 200.0][..]))
        .unwrap();

    assert_eq!(outcome.ranked.len(), 3);
    assert_eq!(outcome.best().candidate.label(), "radii=[0, 130]");
}

#[test]
fn given_crowded_gap_when_checking_then_collisions_are_listed() {
    let temp = TempDir::new().unwrap();
    let tree = write_tree(&temp);

    let check = service(Settings::default()).check(&tree, 100.0).unwrap();

    assert_eq!(check.max_radius, 100.0);
    assert_eq!(check.rings.len(), 2);
    assert_eq!(check.collisions.count, OUTCOMES);
    assert_eq!(check.collisions.details.len(), OUTCOMES);
    assert!(check.collisions.details.iter().all(|c| c.layer == 1));
}

#[test]
fn given_too_few_size_ranges_when_checking_then_missing_ring() {
    let temp = TempDir::new().unwrap();
    let tree = write_tree(&temp);
    let mut settings = Settings::default();
    settings.layout.size_ranges.truncate(1);

    let result = service(settings).check(&tree, 150.0);

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::MissingRing(1)))
    ));
}

#[test]
fn given_search_outcome_when_writing_report_then_json_names_selection() {
    let temp = TempDir::new().unwrap();
    let tree = write_tree(&temp);
    let service = service(Settings::default());
    let outcome = service.search(&tree, Some(&[100.0, 150.0][..])).unwrap();
    let path = temp.path().join("reports/layout.json");

    service.write_report(&outcome, &path).unwrap();

    let report: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["collision_free"], true);
    assert_eq!(report["selected"]["label"], "gap=150px");
    assert_eq!(report["selected"]["collisions"], 0);
    assert_eq!(report["selected"]["max_radius"], 150.0);
    assert_eq!(report["candidates"].as_array().unwrap().len(), 2);
    assert_eq!(report["candidates"][1]["collisions"], OUTCOMES);
}

#[test]
fn given_missing_tree_when_searching_then_input_not_found() {
    let temp = TempDir::new().unwrap();

    let result = service(Settings::default()).search(&temp.path().join("nope.json"), None);

    assert!(matches!(result, Err(ApplicationError::InputNotFound(_))));
}
