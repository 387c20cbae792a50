use std::collections::HashMap;

use generational_arena::{Arena, Index};
use termtree::Tree;
use tracing::instrument;

use crate::domain::entities::{NodeData, NodeId};

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug)]
pub struct HierarchyNode {
    /// Node payload
    pub data: NodeData,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena, in input order
    pub children: Vec<Index>,
}

/// Arena-based layered tree.
///
/// Uses generational arena for memory-safe node references and O(1) lookups.
/// Besides parent/child links it keeps the input order of the flat node list
/// and a per-layer index, both of which the pipelines iterate over.
/// Built once by [`HierarchyBuilder`](crate::domain::HierarchyBuilder), read-only afterwards.
#[derive(Debug)]
pub struct Hierarchy {
    /// Arena storage for all tree nodes
    arena: Arena<HierarchyNode>,
    /// Index of the root node, None while building
    root: Option<Index>,
    index_by_id: HashMap<NodeId, Index>,
    input_order: Vec<Index>,
    /// Node indices grouped by layer, each group in input order
    layers: Vec<Vec<Index>>,
}

impl Hierarchy {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: Arena::with_capacity(capacity),
            root: None,
            index_by_id: HashMap::with_capacity(capacity),
            input_order: Vec::with_capacity(capacity),
            layers: Vec::new(),
        }
    }

    /// Insert a detached node; links are added with [`Hierarchy::attach`].
    pub(crate) fn insert_node(&mut self, data: NodeData) -> Index {
        let layer = data.layer;
        let id = data.id.clone();
        let idx = self.arena.insert(HierarchyNode {
            data,
            parent: None,
            children: Vec::new(),
        });

        if self.layers.len() <= layer {
            self.layers.resize_with(layer + 1, Vec::new);
        }
        self.layers[layer].push(idx);
        self.input_order.push(idx);
        self.index_by_id.insert(id, idx);
        idx
    }

    pub(crate) fn attach(&mut self, child: Index, parent: Index) {
        if let Some(node) = self.arena.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.arena.get_mut(parent) {
            node.children.push(child);
        }
    }

    pub(crate) fn set_root(&mut self, root: Index) {
        self.root = Some(root);
    }

    pub fn get_node(&self, idx: Index) -> Option<&HierarchyNode> {
        self.arena.get(idx)
    }

    pub fn index_of(&self, id: &str) -> Option<Index> {
        self.index_by_id.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.input_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_order.is_empty()
    }

    /// Leaf layer `L`: the deepest layer present.
    pub fn max_layer(&self) -> usize {
        self.layers.len().saturating_sub(1)
    }

    /// Number of layers `L + 1`.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Node indices at `layer`, in input order. Empty for unknown layers.
    pub fn layer(&self, layer: usize) -> &[Index] {
        self.layers.get(layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children_of(&self, idx: Index) -> &[Index] {
        self.get_node(idx)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Nodes in the order of the original flat node list.
    pub fn nodes(&self) -> impl Iterator<Item = (Index, &HierarchyNode)> + '_ {
        self.input_order
            .iter()
            .filter_map(move |&idx| self.get_node(idx).map(|node| (idx, node)))
    }

    /// Nodes of one layer, in input order.
    pub fn layer_nodes(&self, layer: usize) -> impl Iterator<Item = &HierarchyNode> + '_ {
        self.layer(layer)
            .iter()
            .filter_map(move |&idx| self.get_node(idx))
    }

    #[instrument(level = "trace", skip(self))]
    pub fn iter(&self) -> PreOrderIterator<'_> {
        PreOrderIterator::new(self)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self)
    }

    /// Number of levels on the longest root-to-leaf path.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        let mut depths: HashMap<Index, usize> = HashMap::with_capacity(self.len());
        for (idx, node) in self.iter_postorder() {
            let below = node
                .children
                .iter()
                .filter_map(|child| depths.get(child))
                .max()
                .copied()
                .unwrap_or(0);
            depths.insert(idx, below + 1);
        }
        self.root
            .and_then(|root| depths.get(&root).copied())
            .unwrap_or(0)
    }

    /// Render the hierarchy as a printable tree, one line per node.
    pub fn render_tree<F>(&self, format_node: F) -> Tree<String>
    where
        F: Fn(&NodeData) -> String,
    {
        fn build_tree<F: Fn(&NodeData) -> String>(
            hierarchy: &Hierarchy,
            node_idx: Index,
            parent_tree: &mut Tree<String>,
            format_node: &F,
        ) {
            for &child_idx in hierarchy.children_of(node_idx) {
                if let Some(child) = hierarchy.get_node(child_idx) {
                    let mut child_tree = Tree::new(format_node(&child.data));
                    build_tree(hierarchy, child_idx, &mut child_tree, format_node);
                    parent_tree.push(child_tree);
                }
            }
        }

        match self.root.and_then(|idx| self.get_node(idx).map(|n| (idx, n))) {
            Some((root_idx, root)) => {
                let mut tree = Tree::new(format_node(&root.data));
                build_tree(self, root_idx, &mut tree, &format_node);
                tree
            }
            None => Tree::new("Empty hierarchy".to_string()),
        }
    }
}

/// Depth-first pre-order traversal; children are visited in input order.
pub struct PreOrderIterator<'a> {
    hierarchy: &'a Hierarchy,
    stack: Vec<Index>,
}

impl<'a> PreOrderIterator<'a> {
    fn new(hierarchy: &'a Hierarchy) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = hierarchy.root() {
            stack.push(root);
        }
        Self { hierarchy, stack }
    }
}

impl<'a> Iterator for PreOrderIterator<'a> {
    type Item = (Index, &'a HierarchyNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.hierarchy.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}

/// Post-order traversal: every child is yielded before its parent.
pub struct PostOrderIterator<'a> {
    hierarchy: &'a Hierarchy,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(hierarchy: &'a Hierarchy) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = hierarchy.root() {
            stack.push((root, false));
        }
        Self { hierarchy, stack }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a HierarchyNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.hierarchy.get_node(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}
