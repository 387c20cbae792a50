//! Read-only invariant checks over a computed importance map.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::arena::Hierarchy;
use crate::domain::importance::ImportanceMap;

/// Parameters of the data-integrity checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationRules {
    pub outcome_layer: usize,
    pub expected_outcome_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Violates an invariant of the computation itself
    Error,
    /// Violates an expectation about the input data set
    Warning,
}

/// Outcome of one independent check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CheckResult {
    fn new(name: impl Into<String>, passed: bool, severity: Severity) -> Self {
        Self {
            name: name.into(),
            passed,
            severity,
            note: None,
        }
    }

    fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// All check results; the run passes only if every check passes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub checks: Vec<CheckResult>,
}

impl ValidationSummary {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

/// Run every check; none of them short-circuits or panics.
#[instrument(level = "debug", skip(hierarchy, importance))]
pub fn run_checks(
    hierarchy: &Hierarchy,
    importance: &ImportanceMap,
    rules: ValidationRules,
) -> ValidationSummary {
    let mut checks = Vec::with_capacity(4);

    let missing = hierarchy
        .nodes()
        .filter(|(_, node)| !importance.has_entry(node.data.id.as_str()))
        .count();
    let mut coverage = CheckResult::new(
        "All nodes have importance values",
        missing == 0,
        Severity::Error,
    );
    if missing > 0 {
        coverage = coverage.with_note(format!("{missing} nodes without a value"));
    }
    checks.push(coverage);

    let out_of_range = importance
        .normalized_values()
        .filter(|v| !(0.0..=1.0).contains(v))
        .count();
    let mut range = CheckResult::new("All values in [0, 1] range", out_of_range == 0, Severity::Error);
    if out_of_range > 0 {
        range = range.with_note(format!("{out_of_range} values out of range"));
    }
    checks.push(range);

    let outcome_count = hierarchy.layer(rules.outcome_layer).len();
    let mut outcomes = CheckResult::new(
        format!("All {} outcomes present", rules.expected_outcome_count),
        outcome_count == rules.expected_outcome_count,
        Severity::Warning,
    );
    if outcome_count != rules.expected_outcome_count {
        outcomes = outcomes.with_note(format!(
            "found {} nodes at layer {}",
            outcome_count, rules.outcome_layer
        ));
    }
    checks.push(outcomes);

    let max = importance
        .normalized_values()
        .fold(f64::NEG_INFINITY, f64::max);
    let mut max_check = CheckResult::new("Max importance is 1.0", max == 1.0, Severity::Error);
    if importance.is_degenerate() {
        max_check = max_check.with_note("degenerate: all raw scores are zero");
    } else if max != 1.0 {
        max_check = max_check.with_note(format!("max is {max}"));
    }
    checks.push(max_check);

    let summary = ValidationSummary { checks };
    debug!("validation: all_passed={}", summary.all_passed());
    summary
}
