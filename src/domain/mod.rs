//! Domain layer: entities and algorithms
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
pub mod importance;
pub mod layout;
pub mod search;
pub mod statistics;
pub mod subtree;
pub mod validation;

pub use arena::{Hierarchy, HierarchyNode};
pub use builder::HierarchyBuilder;
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use importance::{FloorOutcome, FloorPolicy, ImportanceMap, LeafScore, ScoreSource};
pub use layout::{count_collisions, Collision, CollisionReport, LayoutParams, LayoutSimulator};
pub use search::{search, Candidate, CandidateResult, SearchOutcome};
pub use statistics::{
    boost_warnings, rank_layer, ranking_keys, Coverage, DistributionStats, RankedNode,
};
pub use subtree::SubtreeCache;
pub use validation::{run_checks, CheckResult, Severity, ValidationRules, ValidationSummary};
