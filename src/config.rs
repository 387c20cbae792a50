//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/ringscore/ringscore.toml`
//! 3. Local config: `<project_dir>/.ringscore.toml`
//! 4. Explicit config file passed with `--config`
//! 5. Environment variables: `RINGSCORE__*` prefix, `__` between sections
//!    (e.g. `RINGSCORE__IMPORTANCE__FLOOR__ENABLED=true`)

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::{expand_env_vars, FloorPolicy, LayoutParams, SizeRange, ValidationRules};

/// Floor-boost policy for the outcome layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FloorConfig {
    /// Apply the floor after normalization
    pub enabled: bool,
    /// Fraction of the top outcome every outcome is raised to
    pub percentage: f64,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            percentage: 0.5,
        }
    }
}

/// Node radius bounds recorded in the importance metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SizeMappingConfig {
    pub min_radius_px: f64,
    pub max_radius_px: f64,
}

impl Default for SizeMappingConfig {
    fn default() -> Self {
        Self {
            min_radius_px: 3.0,
            max_radius_px: 15.0,
        }
    }
}

/// Importance pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportanceConfig {
    /// Field of each score record used as the raw leaf score
    pub score_field: String,
    /// Layer holding the outcomes (target of the floor policy)
    pub outcome_layer: usize,
    /// Number of outcomes the data set is expected to have
    pub expected_outcome_count: usize,
    /// Boosts above this factor produce a report warning
    pub boost_warning_threshold: f64,
    /// Rows of the leaf ranking in the summary
    pub top_leaves: usize,
    pub floor: FloorConfig,
    pub size_mapping: SizeMappingConfig,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            score_field: "shap_normalized".into(),
            outcome_layer: 1,
            expected_outcome_count: 9,
            boost_warning_threshold: 10.0,
            top_leaves: 20,
            floor: FloorConfig::default(),
            size_mapping: SizeMappingConfig::default(),
        }
    }
}

/// Layout search settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Extra arc length between neighbouring nodes (px)
    pub padding: f64,
    /// Overlap slack before two nodes count as colliding (px)
    pub tolerance: f64,
    /// Ring gaps swept with equal spacing (`radius = layer * gap`)
    pub gaps: Vec<f64>,
    /// Additional explicit per-layer radius schedules
    pub schedules: Vec<Vec<f64>>,
    /// `[min, max]` node radius per layer, root first
    pub size_ranges: Vec<SizeRange>,
    /// Collision details printed by `layout check`
    pub detail_limit: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            padding: 2.0,
            tolerance: 0.5,
            gaps: vec![
                100.0, 120.0, 140.0, 150.0, 160.0, 180.0, 200.0, 220.0, 250.0, 280.0, 300.0,
                320.0, 350.0, 400.0,
            ],
            schedules: Vec::new(),
            size_ranges: vec![
                SizeRange::new(12.0, 12.0),
                SizeRange::new(3.0, 18.0),
                SizeRange::new(2.0, 14.0),
                SizeRange::new(2.0, 12.0),
                SizeRange::new(1.5, 10.0),
                SizeRange::new(1.0, 8.0),
            ],
            detail_limit: 5,
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for metadata, validation report and summary
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("public/data/importance"),
        }
    }
}

/// Unified configuration for ringscore.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub importance: ImportanceConfig,
    pub layout: LayoutConfig,
    pub output: OutputConfig,
}

// ============================================================
// RAW SETTINGS (one config layer, every key optional)
// ============================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFloor {
    enabled: Option<bool>,
    percentage: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSizeMapping {
    min_radius_px: Option<f64>,
    max_radius_px: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawImportance {
    score_field: Option<String>,
    outcome_layer: Option<usize>,
    expected_outcome_count: Option<usize>,
    boost_warning_threshold: Option<f64>,
    top_leaves: Option<usize>,
    floor: RawFloor,
    size_mapping: RawSizeMapping,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLayout {
    padding: Option<f64>,
    tolerance: Option<f64>,
    gaps: Option<Vec<f64>>,
    schedules: Option<Vec<Vec<f64>>>,
    size_ranges: Option<Vec<SizeRange>>,
    detail_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOutput {
    dir: Option<PathBuf>,
}

/// A single configuration layer before merging.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    importance: RawImportance,
    layout: RawLayout,
    output: RawOutput,
}

impl ImportanceConfig {
    fn overlay(self, raw: RawImportance) -> Self {
        Self {
            score_field: raw.score_field.unwrap_or(self.score_field),
            outcome_layer: raw.outcome_layer.unwrap_or(self.outcome_layer),
            expected_outcome_count: raw
                .expected_outcome_count
                .unwrap_or(self.expected_outcome_count),
            boost_warning_threshold: raw
                .boost_warning_threshold
                .unwrap_or(self.boost_warning_threshold),
            top_leaves: raw.top_leaves.unwrap_or(self.top_leaves),
            floor: FloorConfig {
                enabled: raw.floor.enabled.unwrap_or(self.floor.enabled),
                percentage: raw.floor.percentage.unwrap_or(self.floor.percentage),
            },
            size_mapping: SizeMappingConfig {
                min_radius_px: raw
                    .size_mapping
                    .min_radius_px
                    .unwrap_or(self.size_mapping.min_radius_px),
                max_radius_px: raw
                    .size_mapping
                    .max_radius_px
                    .unwrap_or(self.size_mapping.max_radius_px),
            },
        }
    }
}

impl LayoutConfig {
    /// Lists replace the lower layer's list entirely.
    fn overlay(self, raw: RawLayout) -> Self {
        Self {
            padding: raw.padding.unwrap_or(self.padding),
            tolerance: raw.tolerance.unwrap_or(self.tolerance),
            gaps: raw.gaps.unwrap_or(self.gaps),
            schedules: raw.schedules.unwrap_or(self.schedules),
            size_ranges: raw.size_ranges.unwrap_or(self.size_ranges),
            detail_limit: raw.detail_limit.unwrap_or(self.detail_limit),
        }
    }
}

/// Get the XDG config directory for ringscore.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ringscore").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("ringscore.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".ringscore.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional project directory holding `.ringscore.toml`
    /// * `explicit` - Optional config file that must exist
    ///
    /// Each layer only overrides the keys it sets. Lists (`layout.gaps`,
    /// `layout.schedules`, `layout.size_ranges`) are replaced as a whole.
    pub fn load(project_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("global config: {}", global_path.display());
                current = current.overlay(load_raw_settings(&global_path)?);
            }
        }
        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                debug!("local config: {}", local_path.display());
                current = current.overlay(load_raw_settings(&local_path)?);
            }
        }
        if let Some(path) = explicit {
            current = current.overlay(load_raw_settings(path)?);
        }
        current = current.overlay(Self::env_overrides()?);

        // Expand ~ and $VAR in path-like fields
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// RINGSCORE__* environment variables as one more layer.
    fn env_overrides() -> Result<RawSettings, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("RINGSCORE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("layout.gaps")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;
        config.try_deserialize().map_err(config_err)
    }

    fn overlay(self, raw: RawSettings) -> Self {
        Self {
            importance: self.importance.overlay(raw.importance),
            layout: self.layout.overlay(raw.layout),
            output: OutputConfig {
                dir: raw.output.dir.unwrap_or(self.output.dir),
            },
        }
    }

    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.output.dir.to_string_lossy().as_ref());
        self.output.dir = PathBuf::from(expanded);
    }

    /// Reject values the pipelines cannot work with.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let invalid = |message: String| Err(ApplicationError::Config { message });

        let floor = &self.importance.floor;
        if !(0.0..=1.0).contains(&floor.percentage) {
            return invalid(format!(
                "importance.floor.percentage must be within [0, 1], got {}",
                floor.percentage
            ));
        }
        if self.importance.boost_warning_threshold <= 0.0 {
            return invalid(format!(
                "importance.boost_warning_threshold must be positive, got {}",
                self.importance.boost_warning_threshold
            ));
        }
        let mapping = &self.importance.size_mapping;
        if mapping.min_radius_px < 0.0 || mapping.min_radius_px > mapping.max_radius_px {
            return invalid(format!(
                "importance.size_mapping: need 0 <= min <= max, got [{}, {}]",
                mapping.min_radius_px, mapping.max_radius_px
            ));
        }

        let layout = &self.layout;
        if !(layout.padding >= 0.0) || !(layout.tolerance >= 0.0) {
            return invalid(format!(
                "layout.padding and layout.tolerance must be non-negative, got {} and {}",
                layout.padding, layout.tolerance
            ));
        }
        if let Some(gap) = layout.gaps.iter().find(|gap| !(gap.is_finite() && **gap > 0.0)) {
            return invalid(format!("layout.gaps must be positive, got {gap}"));
        }
        if let Some(schedule) = layout
            .schedules
            .iter()
            .find(|radii| radii.iter().any(|r| !(r.is_finite() && *r >= 0.0)))
        {
            return invalid(format!(
                "layout.schedules radii must be non-negative, got {schedule:?}"
            ));
        }
        if let Some((layer, range)) = layout
            .size_ranges
            .iter()
            .enumerate()
            .find(|(_, range)| range.min < 0.0 || range.min > range.max)
        {
            return invalid(format!(
                "layout.size_ranges[{layer}]: need 0 <= min <= max, got [{}, {}]",
                range.min, range.max
            ));
        }
        Ok(())
    }

    /// Floor policy, if enabled.
    pub fn floor_policy(&self) -> Option<FloorPolicy> {
        self.importance.floor.enabled.then_some(FloorPolicy {
            layer: self.importance.outcome_layer,
            percentage: self.importance.floor.percentage,
        })
    }

    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            outcome_layer: self.importance.outcome_layer,
            expected_outcome_count: self.importance.expected_outcome_count,
        }
    }

    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            padding: self.layout.padding,
            tolerance: self.layout.tolerance,
        }
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# ringscore configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/ringscore/ringscore.toml
#   Local:  <project_dir>/.ringscore.toml
#   Flag:   --config <file>
#   Env:    RINGSCORE__<SECTION>__<KEY> (e.g. RINGSCORE__LAYOUT__PADDING=3)

[importance]
# Field of each score record used as the raw leaf score
# score_field = "shap_normalized"

# Layer of the outcomes, directly below the root
# outcome_layer = 1

# Number of outcomes the data set should contain (mismatch is reported, not fatal)
# expected_outcome_count = 9

# Warn when an outcome is boosted by more than this factor
# boost_warning_threshold = 10.0

# Rows in the leaf ranking of the summary
# top_leaves = 20

[importance.floor]
# Raise every outcome to at least percentage * top outcome (display only)
# enabled = false
# percentage = 0.5

[importance.size_mapping]
# min_radius_px = 3.0
# max_radius_px = 15.0

[layout]
# padding = 2.0
# tolerance = 0.5
# gaps = [100, 120, 140, 150, 160, 180, 200, 220, 250, 280, 300, 320, 350, 400]
# schedules = [[0, 120, 260, 420, 600, 800]]
# size_ranges = [[12, 12], [3, 18], [2, 14], [2, 12], [1.5, 10], [1, 8]]
# detail_limit = 5

[output]
# dir = "public/data/importance"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_validating_then_passes() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.layout.size_ranges.len(), 6);
        assert!(settings.floor_policy().is_none());
    }

    #[test]
    fn given_floor_enabled_when_building_policy_then_targets_outcome_layer() {
        let mut settings = Settings::default();
        settings.importance.floor.enabled = true;
        settings.importance.outcome_layer = 2;

        let policy = settings.floor_policy().unwrap();

        assert_eq!(policy.layer, 2);
        assert_eq!(policy.percentage, 0.5);
    }

    #[test]
    fn given_percentage_above_one_when_validating_then_errors() {
        let mut settings = Settings::default();
        settings.importance.floor.percentage = 1.5;

        assert!(matches!(
            settings.validate(),
            Err(ApplicationError::Config { .. })
        ));
    }

    #[test]
    fn given_inverted_size_range_when_validating_then_errors() {
        let mut settings = Settings::default();
        settings.layout.size_ranges[2] = SizeRange::new(20.0, 4.0);

        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("size_ranges[2]"));
    }

    #[test]
    fn given_zero_gap_when_validating_then_errors() {
        let mut settings = Settings::default();
        settings.layout.gaps.push(0.0);

        assert!(settings.validate().is_err());
    }

    #[test]
    fn given_settings_when_serializing_to_toml_then_round_trips() {
        let settings = Settings::default();
        let toml_str = settings.to_toml().unwrap();

        let parsed: Settings = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed, settings);
    }

    #[test]
    fn given_template_when_parsing_then_is_valid_toml() {
        let parsed: Settings = toml::from_str(&Settings::template()).unwrap();
        assert_eq!(parsed, Settings::default());
    }
}
