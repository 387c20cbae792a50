//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent structural violations of the hierarchy
/// or of the layout parameter space.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("invalid node id: {0:?}")]
    InvalidNodeId(String),

    #[error("hierarchy has no nodes")]
    EmptyHierarchy,

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("node {node} references unknown parent {parent}")]
    DanglingParent { node: String, parent: String },

    #[error("node {node} at layer {layer} has no parent")]
    MissingParent { node: String, layer: usize },

    #[error("root-layer node {node} declares parent {parent}")]
    RootWithParent { node: String, parent: String },

    #[error(
        "node {node} at layer {layer} has parent {parent} at layer {parent_layer} (expected layer {})",
        .layer.saturating_sub(1)
    )]
    LayerMismatch {
        node: String,
        layer: usize,
        parent: String,
        parent_layer: usize,
    },

    #[error("hierarchy has multiple root nodes: {}", .0.join(", "))]
    MultipleRoots(Vec<String>),

    #[error("no ring configuration for layer {0}")]
    MissingRing(usize),

    #[error("no layout candidates to evaluate")]
    NoCandidates,
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
