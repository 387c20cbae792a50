//! Hierarchy loading service
//!
//! Reads a tree document and builds the validated hierarchy from it.

use std::path::Path;
use std::sync::Arc;

use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::documents::TreeDocument;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{Hierarchy, HierarchyBuilder};
use crate::infrastructure::traits::FileSystem;

/// A tree document together with the hierarchy built from it.
#[derive(Debug)]
pub struct LoadedTree {
    pub document: TreeDocument,
    pub hierarchy: Hierarchy,
}

/// Service for reading tree documents.
pub struct HierarchyService {
    fs: Arc<dyn FileSystem>,
}

impl HierarchyService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Read a file that must exist.
    pub fn read_input(&self, path: &Path) -> ApplicationResult<String> {
        if !self.fs.exists(path) {
            return Err(ApplicationError::InputNotFound(path.to_path_buf()));
        }
        self.fs.read_to_string(path).with_path_context("read", path)
    }

    /// Parse and validate a tree document.
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    pub fn load(&self, path: &Path) -> ApplicationResult<LoadedTree> {
        let json = self.read_input(path)?;
        let document = TreeDocument::parse(&json, path)?;
        let hierarchy = HierarchyBuilder::new()
            .nodes(document.records(path)?)
            .build()?;
        debug!(
            "loaded {} nodes on {} layers",
            hierarchy.len(),
            hierarchy.layer_count()
        );
        Ok(LoadedTree {
            document,
            hierarchy,
        })
    }

    /// Tree view of a document: `label [id] importance` per node.
    pub fn render(&self, path: &Path) -> ApplicationResult<Tree<String>> {
        let loaded = self.load(path)?;
        let importance = loaded.document.importance_lookup();
        Ok(loaded.hierarchy.render_tree(|data| {
            match importance.get(&data.id) {
                Some(value) => format!("{data} {value:.3}"),
                None => data.to_string(),
            }
        }))
    }
}
