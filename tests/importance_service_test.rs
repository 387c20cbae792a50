//! Tests for ImportanceService

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tempfile::TempDir;

use ringscore::application::services::{
    ImportanceRequest, ImportanceService, METADATA_FILE, SUMMARY_FILE, VALIDATION_FILE,
};
use ringscore::application::ApplicationError;
use ringscore::config::Settings;
use ringscore::domain::{DomainError, FloorPolicy};
use ringscore::infrastructure::traits::RealFileSystem;
use ringscore::util::testing;

const TREE: &str = r##"{
  "version": "2.1",
  "nodes": [
    {"id": 1, "layer": 0, "label": "Quality of Life", "color": "#000"},
    {"id": 2, "layer": 1, "parent": 1, "label": "Health"},
    {"id": 3, "layer": 1, "parent": 1, "label": "Income"},
    {"id": "g1", "layer": 2, "parent": 2, "label": "Care"},
    {"id": "g2", "layer": 2, "parent": 3, "label": "Jobs"},
    {"id": 10, "layer": 3, "parent": "g1", "label": "Doctors per capita", "source": "WHO"},
    {"id": 11, "layer": 3, "parent": "g1", "label": "Hospital beds"},
    {"id": 12, "layer": 3, "parent": "g2", "label": "Employment rate"}
  ]
}"##;

const SCORES: &str = r#"{
  "10": {"shap_normalized": 6.0, "shap_raw": 0.3},
  "11": {"shap_normalized": 4.0},
  "12": {"shap_normalized": 0.0}
}"#;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write input");
    path
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).expect("read output")).expect("json")
}

fn service(settings: Settings) -> ImportanceService {
    ImportanceService::new(Arc::new(RealFileSystem), Arc::new(settings))
}

fn settings_for_two_outcomes() -> Settings {
    let mut settings = Settings::default();
    settings.importance.expected_outcome_count = 2;
    settings
}

fn request(temp: &TempDir, floor: Option<FloorPolicy>) -> ImportanceRequest {
    let tree = write(temp, "tree.json", TREE);
    let scores = write(temp, "scores.json", SCORES);
    ImportanceRequest {
        tree_out: temp.path().join("out/tree.json"),
        tree,
        scores,
        out_dir: temp.path().join("out/importance"),
        floor,
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()
}

#[test]
fn given_tree_and_scores_when_running_then_writes_all_artifacts() {
    testing::init_test_setup();
    let temp = TempDir::new().unwrap();
    let request = request(&temp, None);

    let run = service(settings_for_two_outcomes())
        .run_on(&request, date())
        .unwrap();

    assert!(run.passed(), "{:?}", run.validation.checks);
    assert_eq!(run.written.len(), 4);
    for name in [METADATA_FILE, VALIDATION_FILE, SUMMARY_FILE] {
        assert!(request.out_dir.join(name).exists(), "{name}");
    }
    assert!(request.tree_out.exists());
}

#[test]
fn given_tree_and_scores_when_running_then_enriched_tree_keeps_fields_and_id_types() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, None);

    service(settings_for_two_outcomes())
        .run_on(&request, date())
        .unwrap();

    let tree = read_json(&request.tree_out);
    assert_eq!(tree["version"], "2.1");
    let nodes = tree["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 8);
    assert_eq!(nodes[0]["id"], 1);
    assert_eq!(nodes[0]["color"], "#000");
    assert_eq!(nodes[0]["importance"], 1.0);
    assert_eq!(nodes[0]["shap_raw"], 10.0);
    assert_eq!(nodes[3]["id"], "g1");
    assert_eq!(nodes[5]["source"], "WHO");
    assert_eq!(nodes[5]["importance"], 0.6);
    assert_eq!(nodes[7]["importance"], 0.0);
}

#[test]
fn given_floor_when_running_then_metadata_records_boost() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, Some(FloorPolicy::default()));

    let run = service(settings_for_two_outcomes())
        .run_on(&request, date())
        .unwrap();

    assert_eq!(run.importance.boosted_count(), 1);
    let metadata = read_json(&request.out_dir.join(METADATA_FILE));
    assert_eq!(metadata["importance_metric"], "shap_hierarchical");
    assert_eq!(metadata["computation_date"], "2026-02-14");
    assert_eq!(metadata["normalization"]["method"], "global_max");
    assert_eq!(metadata["normalization"]["max_value"], 10.0);
    assert_eq!(metadata["normalization"]["floor_applied"], true);
    assert_eq!(metadata["normalization"]["floor_percentage"], 0.5);
    let income = &metadata["node_importance"]["3"];
    assert_eq!(income["shap_raw"], 0.0);
    assert_eq!(income["shap_normalized"], 0.5);
    assert_eq!(income["is_outcome"], true);
    assert_eq!(income["floor_adjusted"], true);
    assert_eq!(income["boost_factor"], "from_zero");
    assert!(metadata["node_importance"]["2"].get("boost_factor").is_none());
    assert_eq!(metadata["size_mapping"]["min_radius_px"], 3.0);
    assert_eq!(metadata["size_mapping"]["max_radius_px"], 15.0);

    let summary = std::fs::read_to_string(request.out_dir.join(SUMMARY_FILE)).unwrap();
    assert!(summary.contains("(with 50% floor applied)"));
    assert!(summary.contains("| 2 | Income | 0.0000 | 0.500 | Yes (from zero) |"));
    assert!(summary.contains("- Total nodes: 8"));
}

#[test]
fn given_floor_when_running_then_validation_report_ranks_and_warns() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, Some(FloorPolicy::default()));

    service(settings_for_two_outcomes())
        .run_on(&request, date())
        .unwrap();

    let report = read_json(&request.out_dir.join(VALIDATION_FILE));
    assert_eq!(report["summary"]["total_nodes"], 8);
    // root, Health, Care, Doctors, Hospital beds, Income (floored)
    assert_eq!(report["summary"]["nodes_with_importance"], 6);
    assert_eq!(report["summary"]["coverage_percentage"], 75.0);
    let outcomes = report["outcome_importance"].as_object().unwrap();
    let labels: Vec<&String> = outcomes.keys().collect();
    assert_eq!(labels, vec!["Health", "Income"]);
    assert_eq!(outcomes["Health"]["rank"], 1);
    assert_eq!(outcomes["Income"]["floor_adjusted"], true);
    assert_eq!(
        report["warnings"],
        serde_json::json!(["Income boosted from zero to meet 50% floor"])
    );
    assert_eq!(report["distribution"]["max"], 1.0);
    assert_eq!(report["all_passed"], true);
    assert_eq!(report["checks"].as_array().unwrap().len(), 4);
}

#[test]
fn given_default_outcome_count_when_running_then_fails_but_still_writes() {
    let temp = TempDir::new().unwrap();
    let request = request(&temp, None);

    let run = service(Settings::default())
        .run_on(&request, date())
        .unwrap();

    assert!(!run.passed());
    assert_eq!(run.validation.failures().count(), 1);
    let report = read_json(&request.out_dir.join(VALIDATION_FILE));
    assert_eq!(report["all_passed"], false);
    assert!(request.tree_out.exists());
}

#[test]
fn given_tree_with_dangling_parent_when_running_then_integrity_error() {
    let temp = TempDir::new().unwrap();
    let tree = write(
        &temp,
        "tree.json",
        r#"{"nodes": [{"id": 1, "layer": 0}, {"id": 2, "layer": 1, "parent": 99}]}"#,
    );
    let scores = write(&temp, "scores.json", "{}");
    let request = ImportanceRequest::from_settings(tree, scores, &Settings::default());

    let result = service(Settings::default()).run_on(&request, date());

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::DanglingParent { .. }))
    ));
}

#[test]
fn given_missing_scores_file_when_running_then_input_not_found() {
    let temp = TempDir::new().unwrap();
    let tree = write(&temp, "tree.json", TREE);
    let request =
        ImportanceRequest::from_settings(tree, temp.path().join("nope.json"), &Settings::default());

    let result = service(Settings::default()).run_on(&request, date());

    assert!(matches!(result, Err(ApplicationError::InputNotFound(_))));
}

#[test]
fn given_default_request_when_running_then_tree_rewritten_in_place() {
    let temp = TempDir::new().unwrap();
    let tree = write(&temp, "tree.json", TREE);
    let scores = write(&temp, "scores.json", SCORES);
    let mut settings = settings_for_two_outcomes();
    settings.output.dir = temp.path().join("reports");
    let request = ImportanceRequest::from_settings(tree.clone(), scores, &settings);

    service(settings).run_on(&request, date()).unwrap();

    let rewritten = read_json(&tree);
    assert_eq!(rewritten["nodes"][1]["importance"], 1.0);
    assert!(temp.path().join("reports").join(METADATA_FILE).exists());
}
