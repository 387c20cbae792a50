//! Hierarchical importance scores and collision-free radial ring layouts.
//!
//! Two pipelines share one layered tree model:
//! - importance: leaf scores summed bottom-up, normalized, optionally
//!   floor-boosted on the outcome layer, validated and reported
//! - layout: ring radii swept through a radial placement simulator to find
//!   the most compact configuration without same-layer overlaps

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
