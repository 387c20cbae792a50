//! Human-readable report rendering
//!
//! Plain text only; colors are added by the CLI.

use chrono::NaiveDate;
use serde::Serialize;

use crate::application::documents::ValidationReport;
use crate::domain::{CandidateResult, Collision, RankedNode, RingConfig, SearchOutcome};

/// Leaf labels longer than this are cut in the summary table.
pub const LABEL_WIDTH: usize = 40;

/// Markdown summary of one importance run.
pub fn render_summary(
    date: NaiveDate,
    outcomes: &[RankedNode],
    leaves: &[RankedNode],
    report: &ValidationReport,
    floor_percentage: Option<f64>,
) -> String {
    let heading = match floor_percentage {
        Some(percentage) => format!(
            "## Outcome Rankings (with {:.0}% floor applied)",
            percentage * 100.0
        ),
        None => "## Outcome Rankings".to_string(),
    };

    let mut lines = vec![
        "# Importance Summary".to_string(),
        String::new(),
        format!("Generated: {}", date.format("%Y-%m-%d")),
        String::new(),
        heading,
        String::new(),
        "| Rank | Outcome | Raw SHAP | Normalized | Floor Adjusted? |".to_string(),
        "|------|---------|----------|------------|-----------------|".to_string(),
    ];
    for row in outcomes {
        let adjusted = match (row.floor_adjusted, row.boost_factor) {
            (true, Some(boost)) => format!("Yes ({boost})"),
            (true, None) => "Yes".to_string(),
            (false, _) => "No".to_string(),
        };
        lines.push(format!(
            "| {} | {} | {:.4} | {:.3} | {} |",
            row.rank, row.label, row.raw, row.normalized, adjusted
        ));
    }

    lines.extend([
        String::new(),
        format!("## Top {} Leaves by Importance", leaves.len()),
        String::new(),
        "| Rank | Leaf | Normalized |".to_string(),
        "|------|------|------------|".to_string(),
    ]);
    for row in leaves {
        lines.push(format!(
            "| {} | {} | {:.4} |",
            row.rank,
            truncate(&row.label, LABEL_WIDTH),
            row.normalized
        ));
    }

    let summary = &report.summary;
    let distribution = &report.distribution;
    lines.extend([
        String::new(),
        "## Distribution Notes".to_string(),
        String::new(),
        format!("- Total nodes: {}", summary.total_nodes),
        format!(
            "- Nodes with importance > 0: {}",
            summary.nodes_with_importance
        ),
        format!("- Mean importance: {:.4}", distribution.mean),
        format!("- Median importance: {:.4}", distribution.median),
        format!("- 95th percentile: {:.4}", distribution.p95),
    ]);
    if !report.warnings.is_empty() {
        lines.extend([String::new(), "## Warnings".to_string(), String::new()]);
        lines.extend(report.warnings.iter().map(|warning| format!("- {warning}")));
    }

    lines.join("\n")
}

/// Cut to at most `width` characters.
pub fn truncate(label: &str, width: usize) -> String {
    label.chars().take(width).collect()
}

/// Ranked candidate table of a layout search.
pub fn render_search_table(outcome: &SearchOutcome) -> String {
    let mut lines = vec![
        format!(
            "{:<5} {:<6} {:<8} {:<8} {}",
            "Rank", "Coll", "MaxRad", "AvgSize", "Config"
        ),
        "-".repeat(45),
    ];
    for (position, result) in outcome.ranked.iter().enumerate() {
        lines.push(format!(
            "{:<5} {:<6} {:<8.0} {:<8.2} {}",
            position + 1,
            result.collisions,
            result.max_radius,
            result.avg_actual_size,
            result.candidate.label()
        ));
    }
    lines.join("\n")
}

/// One line per collision: layer, both ids, overlap and sizes.
pub fn render_collision(collision: &Collision) -> String {
    format!(
        "Layer {}: {} / {} gap={:.2}px, sizes={:.1}+{:.1}px",
        collision.layer,
        collision.first,
        collision.second,
        collision.gap,
        collision.size1,
        collision.size2
    )
}

/// Selected configuration with its explicit radius schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedLayout {
    pub label: String,
    pub radii: Vec<f64>,
    pub rings: Vec<RingConfig>,
    pub collisions: usize,
    pub max_radius: f64,
    pub avg_actual_size: f64,
}

impl From<&CandidateResult> for SelectedLayout {
    fn from(result: &CandidateResult) -> Self {
        Self {
            label: result.candidate.label(),
            radii: result.rings.iter().map(|ring| ring.radius).collect(),
            rings: result.rings.clone(),
            collisions: result.collisions,
            max_radius: result.max_radius,
            avg_actual_size: result.avg_actual_size,
        }
    }
}

/// JSON report of a layout search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutReport {
    pub collision_free: bool,
    pub selected: SelectedLayout,
    pub candidates: Vec<CandidateResult>,
}

impl From<&SearchOutcome> for LayoutReport {
    fn from(outcome: &SearchOutcome) -> Self {
        Self {
            collision_free: outcome.collision_free,
            selected: SelectedLayout::from(outcome.best()),
            candidates: outcome.ranked.clone(),
        }
    }
}
