//! Domain entities: core data structures

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::domain::error::{DomainError, DomainResult};

/// Validated node identifier.
///
/// Source documents carry ids as integers or strings; both are
/// stringified on the way in so lookups across documents agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    /// Create an id, rejecting empty or whitespace-only values.
    pub fn new(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidNodeId(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// One record of the flat node list, after id validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub layer: usize,
    pub parent: Option<NodeId>,
    pub label: String,
}

/// Payload stored for every node in the hierarchy arena.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub id: NodeId,
    pub layer: usize,
    pub label: String,
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.label, self.id)
    }
}

/// Node-radius bounds for one ring, in pixels.
///
/// Serialized as a `[min, max]` pair so config files stay compact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct SizeRange {
    pub min: f64,
    pub max: f64,
}

impl SizeRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl From<(f64, f64)> for SizeRange {
    fn from((min, max): (f64, f64)) -> Self {
        Self { min, max }
    }
}

impl From<SizeRange> for (f64, f64) {
    fn from(range: SizeRange) -> Self {
        (range.min, range.max)
    }
}

/// Per-layer layout parameters for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RingConfig {
    /// Distance of the ring from the center
    pub radius: f64,
    /// Rendered radius of a node with importance 0
    pub min_size: f64,
    /// Rendered radius of a node with importance 1
    pub max_size: f64,
}

impl RingConfig {
    pub fn new(radius: f64, sizes: SizeRange) -> Self {
        Self {
            radius,
            min_size: sizes.min,
            max_size: sizes.max,
        }
    }

    /// Area-proportional node radius: `min + (max - min) * sqrt(importance)`.
    ///
    /// Renderers must use the identical formula, otherwise sizes and
    /// collision results disagree.
    pub fn node_size(&self, importance: f64) -> f64 {
        self.min_size + (self.max_size - self.min_size) * importance.max(0.0).sqrt()
    }

    /// Arc length reserved per node on this ring.
    pub fn node_spacing(&self, padding: f64) -> f64 {
        self.max_size * 2.0 + padding
    }
}

/// Formula string recorded in output metadata next to the size bounds.
pub const SIZE_FORMULA: &str = "radius = min + (max - min) * sqrt(importance)";

/// Node placed by one layout simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedNode {
    pub id: NodeId,
    pub layer: usize,
    pub x: f64,
    pub y: f64,
    /// Actual rendered radius (importance-scaled)
    pub size: f64,
    pub importance: f64,
}

/// Ratio by which the floor policy raised an outcome's importance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoostFactor {
    /// `floor / original` for an originally positive value
    Ratio(f64),
    /// Original value was exactly zero; the ratio is unbounded
    FromZero,
}

impl BoostFactor {
    /// Whether this boost is larger than `threshold`; boosts from zero always are.
    pub fn exceeds(&self, threshold: f64) -> bool {
        match self {
            BoostFactor::Ratio(ratio) => *ratio > threshold,
            BoostFactor::FromZero => true,
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self {
            BoostFactor::Ratio(ratio) => Some(*ratio),
            BoostFactor::FromZero => None,
        }
    }
}

impl fmt::Display for BoostFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoostFactor::Ratio(ratio) => write!(f, "{:.0}x", ratio),
            BoostFactor::FromZero => f.write_str("from zero"),
        }
    }
}

impl Serialize for BoostFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BoostFactor::Ratio(ratio) => serializer.serialize_f64(*ratio),
            BoostFactor::FromZero => serializer.serialize_str("from_zero"),
        }
    }
}

/// Expand environment variables in a path string.
///
/// Supports:
/// - `$VAR` syntax
/// - `${VAR}` syntax
/// - `~` for home directory
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}
