//! Layout search service
//!
//! Sweeps ring-spacing candidates over an importance-enriched tree and
//! reports the most compact collision-free configuration.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::documents::to_json_pretty;
use crate::application::report::LayoutReport;
use crate::application::services::HierarchyService;
use crate::application::{ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{
    search, Candidate, CollisionReport, LayoutSimulator, RingConfig, SearchOutcome, SubtreeCache,
};
use crate::infrastructure::traits::FileSystem;

/// Result of simulating a single configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutCheck {
    pub candidate: Candidate,
    pub rings: Vec<RingConfig>,
    pub max_radius: f64,
    pub collisions: CollisionReport,
}

/// Service for radial layout search.
pub struct LayoutService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
    hierarchy: HierarchyService,
}

impl LayoutService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self {
            hierarchy: HierarchyService::new(fs.clone()),
            fs,
            settings,
        }
    }

    /// Equal-spacing candidates for `gaps` (configured gaps when None),
    /// followed by the configured explicit schedules.
    pub fn candidates(&self, gaps: Option<&[f64]>, layers: usize) -> Vec<Candidate> {
        let layout = &self.settings.layout;
        let gaps = gaps.unwrap_or(&layout.gaps);
        gaps.iter()
            .map(|&gap| Candidate::equal_spacing(gap, layers))
            .chain(layout.schedules.iter().cloned().map(Candidate::schedule))
            .collect()
    }

    /// Rank all candidates for the tree at `tree`.
    #[instrument(skip(self, gaps), fields(tree = %tree.display()))]
    pub fn search(&self, tree: &Path, gaps: Option<&[f64]>) -> ApplicationResult<SearchOutcome> {
        let loaded = self.hierarchy.load(tree)?;
        let importance = loaded.document.importance_lookup();
        let cache = SubtreeCache::build(&loaded.hierarchy);
        let simulator = LayoutSimulator::new(
            &loaded.hierarchy,
            &cache,
            &importance,
            self.settings.layout_params(),
        );

        let candidates = self.candidates(gaps, loaded.hierarchy.layer_count());
        debug!("searching {} candidates", candidates.len());
        Ok(search(&simulator, &candidates, &self.settings.layout.size_ranges)?)
    }

    /// Simulate equal spacing with one gap and keep the collision details.
    #[instrument(skip(self), fields(tree = %tree.display()))]
    pub fn check(&self, tree: &Path, gap: f64) -> ApplicationResult<LayoutCheck> {
        let loaded = self.hierarchy.load(tree)?;
        let importance = loaded.document.importance_lookup();
        let cache = SubtreeCache::build(&loaded.hierarchy);
        let simulator = LayoutSimulator::new(
            &loaded.hierarchy,
            &cache,
            &importance,
            self.settings.layout_params(),
        );

        let candidate = Candidate::equal_spacing(gap, loaded.hierarchy.layer_count());
        let rings = candidate.rings(
            &self.settings.layout.size_ranges,
            loaded.hierarchy.layer_count(),
        )?;
        let simulation = simulator.simulate(&rings)?;
        let max_radius = rings.iter().map(|ring| ring.radius).fold(0.0, f64::max);

        Ok(LayoutCheck {
            candidate,
            rings,
            max_radius,
            collisions: simulation.collisions,
        })
    }

    /// Write the JSON report of a search.
    pub fn write_report(&self, outcome: &SearchOutcome, path: &Path) -> ApplicationResult<()> {
        let json = to_json_pretty(&LayoutReport::from(outcome))?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create parent directory", path)?;
        self.fs.write(path, &json).with_path_context("write", path)
    }
}
