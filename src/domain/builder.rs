//! Hierarchy builder: flat node list to layered arena tree.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::domain::arena::Hierarchy;
use crate::domain::entities::{NodeData, NodeRecord};
use crate::domain::error::{DomainError, DomainResult};

/// Constructs a [`Hierarchy`] from the flat node list of a tree document.
///
/// Children are linked in a single pass over the input, so the child order
/// of every node is the order in which the children appear in the list.
#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    records: Vec<NodeRecord>,
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, record: NodeRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn nodes(mut self, records: impl IntoIterator<Item = NodeRecord>) -> Self {
        self.records.extend(records);
        self
    }

    /// Validate and link the collected records.
    ///
    /// Every structural problem is fatal: the pipelines cannot
    /// proceed without a well-formed, strictly layered tree.
    #[instrument(level = "debug", skip(self), fields(nodes = self.records.len()))]
    pub fn build(self) -> DomainResult<Hierarchy> {
        if self.records.is_empty() {
            return Err(DomainError::EmptyHierarchy);
        }

        let mut seen = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            if !seen.insert(record.id.as_str()) {
                return Err(DomainError::DuplicateNode(record.id.to_string()));
            }
        }

        let mut hierarchy = Hierarchy::with_capacity(self.records.len());
        let indices: Vec<_> = self
            .records
            .iter()
            .map(|record| {
                hierarchy.insert_node(NodeData {
                    id: record.id.clone(),
                    layer: record.layer,
                    label: record.label.clone(),
                })
            })
            .collect();

        let mut roots = Vec::new();
        for (record, &idx) in self.records.iter().zip(&indices) {
            match (&record.parent, record.layer) {
                (Some(parent), 0) => {
                    return Err(DomainError::RootWithParent {
                        node: record.id.to_string(),
                        parent: parent.to_string(),
                    });
                }
                (None, 0) => roots.push(idx),
                (None, layer) => {
                    return Err(DomainError::MissingParent {
                        node: record.id.to_string(),
                        layer,
                    });
                }
                (Some(parent), layer) => {
                    let parent_idx = hierarchy.index_of(parent.as_str()).ok_or_else(|| {
                        DomainError::DanglingParent {
                            node: record.id.to_string(),
                            parent: parent.to_string(),
                        }
                    })?;
                    let parent_layer = hierarchy
                        .get_node(parent_idx)
                        .map(|node| node.data.layer)
                        .unwrap_or_default();
                    if parent_layer + 1 != layer {
                        return Err(DomainError::LayerMismatch {
                            node: record.id.to_string(),
                            layer,
                            parent: parent.to_string(),
                            parent_layer,
                        });
                    }
                    hierarchy.attach(idx, parent_idx);
                }
            }
        }

        // Every parent chain ends at a parentless layer-0 node, so `roots` is never empty
        match roots.as_slice() {
            [root] => {
                hierarchy.set_root(*root);
                debug!(
                    "built hierarchy: nodes={} layers={}",
                    hierarchy.len(),
                    hierarchy.layer_count()
                );
                Ok(hierarchy)
            }
            many => Err(DomainError::MultipleRoots(
                many.iter()
                    .filter_map(|&idx| hierarchy.get_node(idx))
                    .map(|node| node.data.id.to_string())
                    .collect(),
            )),
        }
    }
}
