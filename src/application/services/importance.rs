//! Importance pipeline service
//!
//! Loads a tree and per-leaf scores, aggregates and normalizes importance,
//! validates the result and writes the enriched tree plus the metadata,
//! validation and summary artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{info, instrument, warn};

use crate::application::documents::{
    to_json_pretty, ImportanceMetadata, ScoreTable, ValidationReport,
};
use crate::application::report::render_summary;
use crate::application::services::HierarchyService;
use crate::application::{ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{
    boost_warnings, rank_layer, run_checks, Coverage, DistributionStats, DomainError,
    FloorPolicy, ImportanceMap, RankedNode, ValidationSummary,
};
use crate::infrastructure::traits::FileSystem;

pub const METADATA_FILE: &str = "viz_importance_metadata.json";
pub const VALIDATION_FILE: &str = "shap_importance_validation.json";
pub const SUMMARY_FILE: &str = "shap_importance_summary.md";

/// Inputs and outputs of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceRequest {
    pub tree: PathBuf,
    pub scores: PathBuf,
    /// Directory for metadata, validation report and summary
    pub out_dir: PathBuf,
    /// Where the enriched tree goes; may equal `tree`
    pub tree_out: PathBuf,
    pub floor: Option<FloorPolicy>,
}

impl ImportanceRequest {
    /// Request using the configured output directory and floor,
    /// rewriting the tree in place.
    pub fn from_settings(tree: PathBuf, scores: PathBuf, settings: &Settings) -> Self {
        Self {
            tree_out: tree.clone(),
            tree,
            scores,
            out_dir: settings.output.dir.clone(),
            floor: settings.floor_policy(),
        }
    }
}

/// Everything a run computed, plus the files it wrote.
#[derive(Debug, Clone)]
pub struct ImportanceRun {
    pub importance: ImportanceMap,
    pub validation: ValidationSummary,
    pub report: ValidationReport,
    pub outcomes: Vec<RankedNode>,
    pub written: Vec<PathBuf>,
}

impl ImportanceRun {
    pub fn passed(&self) -> bool {
        self.validation.all_passed()
    }
}

/// Service computing hierarchical importance.
pub struct ImportanceService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
    hierarchy: HierarchyService,
}

impl ImportanceService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self {
            hierarchy: HierarchyService::new(fs.clone()),
            fs,
            settings,
        }
    }

    /// Run the pipeline with today's date.
    pub fn run(&self, request: &ImportanceRequest) -> ApplicationResult<ImportanceRun> {
        self.run_on(request, Local::now().date_naive())
    }

    /// Run the pipeline and write all artifacts.
    ///
    /// Artifacts are written whether or not validation passes;
    /// [`ImportanceRun::passed`] carries the verdict.
    #[instrument(skip(self), fields(tree = %request.tree.display(), scores = %request.scores.display()))]
    pub fn run_on(
        &self,
        request: &ImportanceRequest,
        date: NaiveDate,
    ) -> ApplicationResult<ImportanceRun> {
        let settings = &self.settings.importance;
        let mut loaded = self.hierarchy.load(&request.tree)?;
        let hierarchy = &loaded.hierarchy;

        let scores_json = self.hierarchy.read_input(&request.scores)?;
        let scores = ScoreTable::parse(&scores_json, &settings.score_field, &request.scores)?;
        info!("loaded {} scores for {} nodes", scores.len(), hierarchy.len());

        let importance = ImportanceMap::compute_with_floor(hierarchy, &scores, request.floor);
        let diagnostics = importance.diagnostics();
        info!(
            "leaves: {} scored, {} missing, {} invalid",
            diagnostics.leaves_scored, diagnostics.leaves_missing, diagnostics.leaves_invalid
        );

        let rules = self.settings.validation_rules();
        let validation = run_checks(hierarchy, &importance, rules);
        for failure in validation.failures() {
            warn!("check failed: {}", failure.name);
        }

        let floor_percentage = request
            .floor
            .map(|policy| policy.percentage)
            .unwrap_or(settings.floor.percentage);
        let outcomes = rank_layer(hierarchy, &importance, rules.outcome_layer, None);
        let leaves = rank_layer(
            hierarchy,
            &importance,
            hierarchy.max_layer(),
            Some(settings.top_leaves),
        );
        let distribution = DistributionStats::from_values(importance.normalized_values())
            .ok_or(DomainError::EmptyHierarchy)?
            .rounded(6);
        let warnings = boost_warnings(&outcomes, settings.boost_warning_threshold, floor_percentage);
        let report = ValidationReport::build(
            Coverage::compute(hierarchy, &importance),
            &outcomes,
            distribution,
            warnings,
            validation.checks.clone(),
        );
        let metadata = ImportanceMetadata::build(
            hierarchy,
            &importance,
            rules.outcome_layer,
            floor_percentage,
            (
                settings.size_mapping.min_radius_px,
                settings.size_mapping.max_radius_px,
            ),
            date,
        );
        let floor_applied = importance.floor().is_some_and(|floor| !floor.skipped);
        let summary = render_summary(
            date,
            &outcomes,
            &leaves,
            &report,
            floor_applied.then_some(floor_percentage),
        );

        self.fs
            .create_dir_all(&request.out_dir)
            .with_path_context("create output directory", &request.out_dir)?;
        let mut written = Vec::with_capacity(4);
        written.push(self.write(&request.out_dir.join(METADATA_FILE), &to_json_pretty(&metadata)?)?);
        written.push(self.write(&request.out_dir.join(VALIDATION_FILE), &to_json_pretty(&report)?)?);
        written.push(self.write(&request.out_dir.join(SUMMARY_FILE), &summary)?);

        loaded.document.enrich(&importance);
        written.push(self.write(&request.tree_out, &loaded.document.to_json_pretty()?)?);

        info!(
            "importance written, all checks {}",
            if validation.all_passed() { "passed" } else { "failed" }
        );
        Ok(ImportanceRun {
            importance,
            validation,
            report,
            outcomes,
            written,
        })
    }

    fn write(&self, path: &Path, content: &str) -> ApplicationResult<PathBuf> {
        self.fs
            .ensure_parent(path)
            .with_path_context("create parent directory", path)?;
        self.fs.write(path, content).with_path_context("write", path)?;
        Ok(path.to_path_buf())
    }
}
